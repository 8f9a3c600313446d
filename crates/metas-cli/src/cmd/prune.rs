use anyhow::{Context as _, Result};
use clap::Args;
use metas_core::prune;
use std::io::Write;

use super::Session;
use crate::output::{pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Only this indicator.
    #[arg(long)]
    pub indicator_id: Option<i64>,

    /// Delete the rows; without it only counts are reported.
    #[arg(long)]
    pub apply: bool,
}

/// Execute `metas prune-future`: remove targets and pending submissions
/// from the current month onwards.
///
/// # Errors
///
/// Returns an error if the store fails; nothing is deleted then.
pub fn run_prune(args: &PruneArgs, session: &Session) -> Result<()> {
    let mut conn = session.open()?;
    let report = prune::prune_future(&mut conn, &session.clock, args.indicator_id, !args.apply)
        .context("prune future competences")?;

    render_mode(
        session.output,
        &report,
        |r, w| {
            let mode = if r.dry_run { "dry-run" } else { "applied" };
            writeln!(w, "{mode}\ttargets={}\tpending_submissions={}", r.targets, r.pending_submissions)
        },
        |r, w| {
            if r.dry_run {
                writeln!(w, "Would prune (use --apply to delete):")?;
            } else {
                writeln!(w, "✓ Pruned future competences")?;
            }
            pretty_kv(w, "Targets", r.targets.to_string())?;
            pretty_kv(w, "Pending", r.pending_submissions.to_string())
        },
    )
}
