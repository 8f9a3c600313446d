use anyhow::{Context as _, Result};
use clap::Args;
use metas_core::calendar::Month;
use metas_core::reconcile::{self, BackfillOptions};
use std::io::Write;

use super::Session;
use crate::output::{pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Only this indicator.
    #[arg(long)]
    pub indicator_id: Option<i64>,

    /// Horizon override (YYYY-MM); defaults to the last elapsed month.
    #[arg(long)]
    pub until: Option<Month>,

    /// Delete targets after the horizon even without an end month.
    #[arg(long)]
    pub hard_cap: bool,
}

/// Execute `metas reconcile`: bring every active indicator's target rows in
/// line with its schedule.
///
/// # Errors
///
/// Returns an error if a requested indicator does not exist or the store
/// fails. Per-indicator failures are logged and counted as skipped.
pub fn run_reconcile(args: &ReconcileArgs, session: &Session) -> Result<()> {
    let mut conn = session.open()?;
    let placeholders = &session.config.project.sanitize;
    let options = BackfillOptions {
        indicator_id: args.indicator_id,
        until: args.until,
        hard_cap: args.hard_cap || session.config.project.reconcile.hard_cap,
        placeholder_origin: placeholders
            .create_missing
            .then_some(placeholders.placeholder_origin.as_str()),
    };

    let report = reconcile::backfill(&mut conn, &session.clock, options).context("reconcile targets")?;

    render_mode(
        session.output,
        &report,
        |r, w| {
            writeln!(
                w,
                "processed={}\tskipped={}\tcreated={}\tremoved={}\tplaceholders={}",
                r.processed, r.skipped, r.created, r.removed, r.placeholders
            )
        },
        |r, w| {
            writeln!(w, "✓ Reconciled {} indicator(s)", r.processed)?;
            pretty_kv(w, "Created", r.created.to_string())?;
            pretty_kv(w, "Removed", r.removed.to_string())?;
            pretty_kv(w, "Placeholders", r.placeholders.to_string())?;
            if r.skipped > 0 {
                pretty_kv(w, "Skipped", format!("{} (see warnings)", r.skipped))?;
            }
            Ok(())
        },
    )
}
