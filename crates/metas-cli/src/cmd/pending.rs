use anyhow::Result;
use clap::Args;
use metas_core::MetasError;
use metas_core::db::sectors;
use metas_core::pending::pending_competences;
use std::io::Write;

use super::Session;
use crate::output::{pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct PendingArgs {
    /// Count only this actor's confirmed submissions; defaults to the user
    /// config's `actor`.
    #[arg(long)]
    pub actor: Option<String>,

    /// Ignore the configured actor and count anyone's submissions.
    #[arg(long, conflicts_with = "actor")]
    pub anyone: bool,

    /// Only indicators of this sector (by name).
    #[arg(long)]
    pub sector: Option<String>,
}

/// Execute `metas pending`: competences still waiting for a confirmed value.
///
/// # Errors
///
/// Returns an error if the sector is unknown or a query fails.
pub fn run_pending(args: &PendingArgs, session: &Session) -> Result<()> {
    let conn = session.open()?;
    let sector_id = match &args.sector {
        Some(name) => Some(
            sectors::find_by_name(&conn, name)?
                .ok_or_else(|| MetasError::InvalidInput(format!("unknown sector '{name}'")))?
                .id,
        ),
        None => None,
    };
    let actor = if args.anyone {
        None
    } else {
        session.actor(args.actor.as_deref())
    };

    let rows = pending_competences(&conn, &session.clock, actor, sector_id)?;

    render_mode(
        session.output,
        &rows,
        |rows, w| {
            for p in rows {
                writeln!(w, "{}\t{}\t{}\t{}", p.indicator_id, p.competence, p.value_kind, p.name)?;
            }
            Ok(())
        },
        |rows, w| {
            pretty_section(w, &format!("Pending competences ({})", rows.len()))?;
            for p in rows {
                writeln!(w, "  #{:<4} {}  {:<28} {}", p.indicator_id, p.competence, p.name, p.value_kind.as_str())?;
                if !p.instructions.is_empty() {
                    writeln!(w, "         {}", p.instructions)?;
                }
            }
            Ok(())
        },
    )
}
