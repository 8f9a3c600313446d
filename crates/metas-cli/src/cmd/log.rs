//! `metas log`: action log inspection.

use anyhow::Result;
use clap::Args;
use metas_core::db::audit;
use std::io::Write;

use super::Session;
use crate::output::{pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Maximum number of entries to show, newest first.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,
}

/// # Errors
///
/// Returns an error if the store is missing or the query fails.
pub fn run_log(args: &LogArgs, session: &Session) -> Result<()> {
    let conn = session.open()?;
    let entries = audit::recent(&conn, args.limit)?;
    let last_sanitized = audit::last_sanitized_at(&conn)?;

    render_mode(
        session.output,
        &entries,
        |rows, w| {
            for e in rows {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}",
                    e.id,
                    e.at.to_rfc3339(),
                    e.actor.as_deref().unwrap_or("-"),
                    e.action
                )?;
            }
            Ok(())
        },
        |rows, w| {
            pretty_section(w, &format!("Action log ({})", rows.len()))?;
            for e in rows {
                writeln!(
                    w,
                    "  {}  {:<12} {}",
                    e.at.format("%Y-%m-%d %H:%M"),
                    e.actor.as_deref().unwrap_or("-"),
                    e.action
                )?;
            }
            if let Some(at) = last_sanitized {
                writeln!(w)?;
                writeln!(w, "Last sanitize run: {}", at.format("%Y-%m-%d %H:%M UTC"))?;
            }
            Ok(())
        },
    )
}
