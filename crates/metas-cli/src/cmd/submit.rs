//! `metas submit`: record a realized value for one competence.

use anyhow::{Context as _, Result};
use clap::Args;
use metas_core::amount::Amount;
use metas_core::calendar::Month;
use metas_core::db::submissions;
use metas_core::lifecycle::{self, NewSubmission};
use std::io::Write;

use super::Session;
use crate::output::{pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Indicator id.
    pub indicator_id: i64,

    /// Competence month (YYYY-MM).
    pub competence: Month,

    /// Realized value. Omit to record a pending row.
    #[arg(allow_hyphen_values = true)]
    pub value: Option<Amount>,

    /// Submitting user; defaults to the user config's `actor`.
    #[arg(long)]
    pub actor: Option<String>,

    /// Where the value came from (e.g. "manual", "import").
    #[arg(long)]
    pub origin: Option<String>,

    /// Link or path to supporting evidence.
    #[arg(long)]
    pub evidence: Option<String>,

    #[arg(long)]
    pub comment: Option<String>,
}

/// # Errors
///
/// Returns an error if the indicator does not exist, a confirmed row would
/// be cleared, or the store fails.
pub fn run_submit(args: &SubmitArgs, session: &Session) -> Result<()> {
    let mut conn = session.open()?;
    let new = NewSubmission {
        indicator_id: args.indicator_id,
        competence: args.competence,
        actor: session.actor(args.actor.as_deref()),
        value: args.value,
        origin: args.origin.as_deref(),
        evidence: args.evidence.as_deref(),
        comment: args.comment.as_deref(),
    };

    let id = lifecycle::record_submission(&mut conn, &session.clock, &new)
        .with_context(|| format!("submit {} for indicator {}", args.competence, args.indicator_id))?;
    let stored = submissions::get(&conn, id)?
        .with_context(|| format!("submission {id} vanished after write"))?;

    render_mode(
        session.output,
        &stored,
        |s, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}",
                s.id,
                s.competence,
                s.value.map_or_else(|| "-".to_string(), |v| v.to_string()),
                if s.is_pending() { "pending" } else { "confirmed" }
            )
        },
        |s, w| {
            writeln!(w, "✓ Recorded submission #{}", s.id)?;
            pretty_kv(w, "Competence", s.competence.to_string())?;
            pretty_kv(w, "Value", s.value.map_or_else(|| "pending".to_string(), |v| v.to_string()))?;
            pretty_kv(w, "Status", if s.is_pending() { "pending" } else { "confirmed" })
        },
    )
}
