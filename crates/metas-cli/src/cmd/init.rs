use anyhow::{Context as _, Result};
use clap::Args;
use metas_core::config::PROJECT_DIR;
use metas_core::db::{self, migrations};
use serde::Serialize;
use std::io::Write;

use super::Session;
use crate::output::{pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite `.metas/config.toml` even if it already exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[reconcile]\n\
    hard_cap = false\n\
    \n\
    [sanitize]\n\
    placeholder_origin = \"sanitizer-placeholder\"\n\
    create_missing = true\n\
    \n\
    [attainment]\n\
    monitoring_tolerance = \"5.00\"\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    config: String,
    database: String,
    schema_version: u32,
}

/// Execute `metas init`. Creates the project skeleton:
///
/// ```text
/// .metas/
///   config.toml   (default project config)
///   metas.db      (unless --db points elsewhere)
/// ```
///
/// Re-running against an existing store only applies pending migrations.
///
/// # Errors
///
/// Returns an error if the config exists and `--force` is not set, or if
/// any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, session: &Session) -> Result<()> {
    let project_dir = session.root.join(PROJECT_DIR);
    let config_path = project_dir.join("config.toml");

    if config_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists. Use `metas init --force` to rewrite it.",
            config_path.display()
        );
    }

    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("Failed to create {}", project_dir.display()))?;
    std::fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let conn = db::open_store(&session.db_path)?;
    let schema_version = migrations::current_schema_version(&conn)?;
    tracing::info!(db = %session.db_path.display(), schema_version, "store initialized");

    let output = InitOutput {
        config: config_path.display().to_string(),
        database: session.db_path.display().to_string(),
        schema_version,
    };

    render_mode(
        session.output,
        &output,
        |o, w| writeln!(w, "config\t{}\ndatabase\t{}\nschema\t{}", o.config, o.database, o.schema_version),
        |o, w| {
            writeln!(w, "✓ Initialized metas project.")?;
            writeln!(w)?;
            pretty_kv(w, "Config", &o.config)?;
            pretty_kv(w, "Database", &o.database)?;
            pretty_kv(w, "Schema", o.schema_version.to_string())?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  metas sector add \"Finance\"")?;
            writeln!(w, "  metas indicator add --name Revenue --sector Finance --target 1000 --start 2025-01")
        },
    )
}
