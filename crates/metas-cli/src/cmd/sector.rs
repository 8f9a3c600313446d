//! `metas sector add|list`.

use anyhow::Result;
use clap::{Args, Subcommand};
use metas_core::clock::Clock;
use metas_core::db::{audit, sectors};
use std::io::Write;

use super::Session;
use crate::output::{pretty_section, render, render_mode};

#[derive(Subcommand, Debug)]
pub enum SectorCommand {
    /// Create a sector (no-op when the name already exists).
    Add(SectorAddArgs),
    /// List sectors by name.
    List,
}

#[derive(Args, Debug)]
pub struct SectorAddArgs {
    /// Sector name.
    pub name: String,

    /// Actor recorded in the action log.
    #[arg(long)]
    pub actor: Option<String>,
}

/// # Errors
///
/// Returns an error if the store is missing or a query fails.
pub fn run_sector(command: &SectorCommand, session: &Session) -> Result<()> {
    match command {
        SectorCommand::Add(args) => run_add(args, session),
        SectorCommand::List => run_list(session),
    }
}

fn run_add(args: &SectorAddArgs, session: &Session) -> Result<()> {
    let mut conn = session.open()?;
    let tx = conn.transaction()?;
    let id = sectors::upsert_by_name(&tx, &args.name)?;
    audit::record(
        &tx,
        session.actor(args.actor.as_deref()),
        &format!("add sector {id} {}", args.name.trim()),
        session.clock.now(),
    )?;
    let sector = sectors::get(&tx, id)?;
    tx.commit()?;

    render(session.output, &sector, |s, w| match s {
        Some(s) => writeln!(w, "{}\t{}", s.id, s.name),
        None => Ok(()),
    })
}

fn run_list(session: &Session) -> Result<()> {
    let conn = session.open()?;
    let all = sectors::list(&conn)?;

    render_mode(
        session.output,
        &all,
        |rows, w| {
            for s in rows {
                writeln!(w, "{}\t{}\t{}", s.id, s.name, if s.active { "active" } else { "inactive" })?;
            }
            Ok(())
        },
        |rows, w| {
            pretty_section(w, &format!("Sectors ({})", rows.len()))?;
            for s in rows {
                let marker = if s.active { "" } else { "  (inactive)" };
                writeln!(w, "{:>4}  {}{marker}", s.id, s.name)?;
            }
            Ok(())
        },
    )
}
