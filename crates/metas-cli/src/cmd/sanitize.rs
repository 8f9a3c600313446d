//! `metas sanitize`: bring submissions in line with each schedule.
//!
//! Dry-run is the default; nothing is written without `--apply`. The global
//! `--verbose` adds per-indicator counts and one line per touched competence.

use anyhow::{Context as _, Result};
use clap::Args;
use metas_core::calendar::Month;
use metas_core::sanitize::{self, PlanCounts, SanitizeOptions, SanitizeReport};
use std::io::Write;

use super::Session;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct SanitizeArgs {
    /// Only this indicator.
    #[arg(long)]
    pub indicator_id: Option<i64>,

    /// First competence considered (YYYY-MM, inclusive).
    #[arg(long)]
    pub since: Option<Month>,

    /// Last competence considered (YYYY-MM, inclusive). Never later than
    /// the last elapsed month.
    #[arg(long)]
    pub until: Option<Month>,

    /// Do not create placeholders for missing competences.
    #[arg(long)]
    pub no_create_missing: bool,

    /// Delete pending rows after the end month, outside the window too.
    #[arg(long)]
    pub hard_cap: bool,

    /// Write the changes.
    #[arg(long, conflicts_with = "dry_run")]
    pub apply: bool,

    /// Report what would change without writing (default).
    #[arg(long)]
    pub dry_run: bool,
}

impl SanitizeArgs {
    fn options(&self, session: &Session) -> Result<SanitizeOptions> {
        match (self.since, self.until) {
            (Some(since), Some(until)) if until < since => {
                anyhow::bail!("--until {until} precedes --since {since}");
            }
            _ => {}
        }

        let config = &session.config.project.sanitize;
        Ok(SanitizeOptions {
            indicator_id: self.indicator_id,
            since: self.since,
            until: self.until,
            create_missing: config.create_missing && !self.no_create_missing,
            hard_cap: self.hard_cap,
            dry_run: !self.apply,
            placeholder_origin: config.placeholder_origin.clone(),
        })
    }
}

fn counts_line(c: &PlanCounts) -> String {
    format!(
        "set_null={}\tdeleted={}\tcreated={}\tdedup={}\tflags_repaired={}",
        c.set_null, c.deleted, c.created, c.dedup, c.flags_repaired
    )
}

/// # Errors
///
/// Returns an error if `--until` precedes `--since`, if a requested
/// indicator does not exist, or if the store fails before any indicator
/// is processed.
pub fn run_sanitize(args: &SanitizeArgs, session: &Session) -> Result<()> {
    let options = args.options(session)?;
    let mut conn = session.open()?;
    let report = sanitize::run(&mut conn, &session.clock, &options).context("sanitize submissions")?;
    let verbose = session.verbose;

    render_mode(
        session.output,
        &report,
        |r: &SanitizeReport, w| {
            let mode = if r.dry_run { "dry-run" } else { "applied" };
            writeln!(
                w,
                "{mode}\tprocessed={}\tskipped={}\t{}\telapsed_ms={}",
                r.processed,
                r.skipped,
                counts_line(&r.totals),
                r.elapsed_ms
            )?;
            if verbose {
                for o in &r.indicators {
                    writeln!(w, "{}\t{}\t{}\t{}", o.indicator_id, o.name, o.horizon, counts_line(&o.counts))?;
                    for action in &o.actions {
                        writeln!(w, "indicator={}\t{action}", o.indicator_id)?;
                    }
                }
            }
            Ok(())
        },
        |r, w| {
            let heading = if r.dry_run {
                "Sanitize (dry run, use --apply to write)"
            } else {
                "Sanitize (applied)"
            };
            pretty_section(w, heading)?;
            pretty_kv(w, "Processed", r.processed.to_string())?;
            pretty_kv(w, "Skipped", r.skipped.to_string())?;
            pretty_kv(w, "Set null", r.totals.set_null.to_string())?;
            pretty_kv(w, "Deleted", r.totals.deleted.to_string())?;
            pretty_kv(w, "Created", r.totals.created.to_string())?;
            pretty_kv(w, "Deduplicated", r.totals.dedup.to_string())?;
            pretty_kv(w, "Flags fixed", r.totals.flags_repaired.to_string())?;
            pretty_kv(w, "Elapsed", format!("{:.1?}", r.elapsed))?;
            if verbose && !r.indicators.is_empty() {
                writeln!(w)?;
                for o in &r.indicators {
                    let c = &o.counts;
                    writeln!(
                        w,
                        "  #{:<4} {:<28} ..{}  null {:>3}  del {:>3}  new {:>3}  dup {:>3}  flags {:>3}",
                        o.indicator_id, o.name, o.horizon, c.set_null, c.deleted, c.created, c.dedup, c.flags_repaired
                    )?;
                    for action in &o.actions {
                        writeln!(w, "        {action}")?;
                    }
                }
            }
            Ok(())
        },
    )
}
