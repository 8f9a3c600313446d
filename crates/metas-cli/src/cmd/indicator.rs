//! `metas indicator add|update|list|show|remove`.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use metas_core::MetasError;
use metas_core::amount::Amount;
use metas_core::calendar::Month;
use metas_core::db::{indicators, sectors, submissions, targets};
use metas_core::lifecycle::{self, IndicatorChanges, NewIndicator, RemovedIndicator, SavedIndicator};
use metas_core::model::{Indicator, MonthlyTarget, Sector, Submission, TargetDirection, ValueKind};
use serde::Serialize;
use std::io::Write;

use super::Session;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum IndicatorCommand {
    /// Create an indicator and its targets up to the current horizon.
    Add(AddArgs),
    /// Change an indicator; targets are reconciled afterwards.
    Update(UpdateArgs),
    /// List indicators.
    List(ListArgs),
    /// Show one indicator with its targets and submissions.
    Show(ShowArgs),
    /// Delete an indicator with its targets and submissions.
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[arg(long)]
    pub name: String,

    /// Sector name; created when missing.
    #[arg(long)]
    pub sector: String,

    /// increasing, decreasing or monitoring.
    #[arg(long, default_value = "increasing")]
    pub direction: TargetDirection,

    /// Default monthly target, e.g. `1.500,00` or `1500.00`.
    #[arg(long, allow_hyphen_values = true)]
    pub target: Amount,

    /// numeric, monetary or percentage.
    #[arg(long, default_value = "numeric")]
    pub kind: ValueKind,

    /// First competence (YYYY-MM). Falls back to the creation month.
    #[arg(long)]
    pub start: Option<Month>,

    /// Last competence (YYYY-MM).
    #[arg(long)]
    pub end: Option<Month>,

    /// Months between competences, 1..=12.
    #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
    pub periodicity: i64,

    /// Create the indicator inactive.
    #[arg(long)]
    pub inactive: bool,

    /// Hide the indicator from dashboards.
    #[arg(long)]
    pub hidden: bool,

    /// How the value is extracted.
    #[arg(long, default_value = "")]
    pub instructions: String,

    /// Actor recorded in the action log.
    #[arg(long)]
    pub actor: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: i64,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub sector: Option<String>,

    #[arg(long)]
    pub direction: Option<TargetDirection>,

    #[arg(long, allow_hyphen_values = true)]
    pub target: Option<Amount>,

    #[arg(long)]
    pub kind: Option<ValueKind>,

    #[arg(long, conflicts_with = "clear_start")]
    pub start: Option<Month>,

    /// Remove the start month (anchor falls back to the creation month).
    #[arg(long)]
    pub clear_start: bool,

    #[arg(long, conflicts_with = "clear_end")]
    pub end: Option<Month>,

    /// Remove the end month.
    #[arg(long)]
    pub clear_end: bool,

    #[arg(long, allow_hyphen_values = true)]
    pub periodicity: Option<i64>,

    #[arg(long)]
    pub active: Option<bool>,

    #[arg(long)]
    pub visible: Option<bool>,

    #[arg(long)]
    pub instructions: Option<String>,

    #[arg(long)]
    pub actor: Option<String>,
}

impl UpdateArgs {
    fn changes(&self) -> IndicatorChanges {
        IndicatorChanges {
            name: self.name.clone(),
            sector: self.sector.clone(),
            direction: self.direction,
            target_value: self.target,
            value_kind: self.kind,
            start_month: if self.clear_start { Some(None) } else { self.start.map(Some) },
            end_month: if self.clear_end { Some(None) } else { self.end.map(Some) },
            periodicity: self.periodicity,
            active: self.active,
            visible: self.visible,
            instructions: self.instructions.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Include inactive indicators.
    #[arg(long)]
    pub all: bool,

    /// Only indicators of this sector (by name).
    #[arg(long)]
    pub sector: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub id: i64,

    #[arg(long)]
    pub actor: Option<String>,
}

#[derive(Debug, Serialize)]
struct IndicatorDetail {
    indicator: Indicator,
    sector: Option<Sector>,
    targets: Vec<MonthlyTarget>,
    submissions: Vec<Submission>,
}

/// # Errors
///
/// Returns an error if the store is missing, validation fails, or a query
/// fails.
pub fn run_indicator(command: &IndicatorCommand, session: &Session) -> Result<()> {
    match command {
        IndicatorCommand::Add(args) => run_add(args, session),
        IndicatorCommand::Update(args) => run_update(args, session),
        IndicatorCommand::List(args) => run_list(args, session),
        IndicatorCommand::Show(args) => run_show(args, session),
        IndicatorCommand::Remove(args) => run_remove(args, session),
    }
}

fn run_add(args: &AddArgs, session: &Session) -> Result<()> {
    let mut conn = session.open()?;
    let placeholders = &session.config.project.sanitize;
    let new = NewIndicator {
        name: args.name.clone(),
        sector: args.sector.clone(),
        direction: args.direction,
        target_value: args.target,
        value_kind: args.kind,
        start_month: args.start,
        end_month: args.end,
        periodicity: args.periodicity,
        active: !args.inactive,
        visible: !args.hidden,
        instructions: args.instructions.clone(),
        placeholder_origin: placeholders
            .create_missing
            .then(|| placeholders.placeholder_origin.clone()),
    };

    let saved = lifecycle::create_indicator(
        &mut conn,
        &session.clock,
        session.actor(args.actor.as_deref()),
        &new,
    )
    .context("create indicator")?;
    render_saved(session, &saved, "Created")
}

fn run_update(args: &UpdateArgs, session: &Session) -> Result<()> {
    let mut conn = session.open()?;
    let saved = lifecycle::update_indicator(
        &mut conn,
        &session.clock,
        session.actor(args.actor.as_deref()),
        args.id,
        &args.changes(),
    )
    .with_context(|| format!("update indicator {}", args.id))?;
    render_saved(session, &saved, "Updated")
}

fn render_saved(session: &Session, saved: &SavedIndicator, verb: &str) -> Result<()> {
    render_mode(
        session.output,
        saved,
        |s, w| {
            writeln!(
                w,
                "{}\t{}\tcreated={}\tremoved={}\tplaceholders={}\tpurged_targets={}\tpurged_submissions={}",
                s.indicator.id,
                s.indicator.name,
                s.reconcile.created,
                s.reconcile.removed,
                s.placeholders,
                s.purged_targets,
                s.purged_submissions
            )
        },
        |s, w| {
            writeln!(w, "✓ {verb} indicator {} ({})", s.indicator.id, s.indicator.name)?;
            pretty_kv(w, "Targets", format!("+{} / -{}", s.reconcile.created, s.reconcile.removed))?;
            if s.placeholders > 0 {
                pretty_kv(w, "Placeholders", s.placeholders.to_string())?;
            }
            if s.purged_targets + s.purged_submissions > 0 {
                pretty_kv(
                    w,
                    "Purged",
                    format!("{} targets, {} pending submissions", s.purged_targets, s.purged_submissions),
                )?;
            }
            Ok(())
        },
    )
}

fn run_list(args: &ListArgs, session: &Session) -> Result<()> {
    let conn = session.open()?;
    let sector_id = match &args.sector {
        Some(name) => Some(
            sectors::find_by_name(&conn, name)?
                .ok_or_else(|| MetasError::InvalidInput(format!("unknown sector '{name}'")))?
                .id,
        ),
        None => None,
    };
    let filter = indicators::IndicatorFilter {
        active_only: !args.all,
        id: None,
        sector_id,
    };
    let rows = indicators::list(&conn, filter)?;

    render_mode(
        session.output,
        &rows,
        |rows, w| {
            for i in rows {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    i.id,
                    i.name,
                    i.direction,
                    i.target_value,
                    i.start_month.map_or_else(String::new, |m| m.to_string()),
                    i.end_month.map_or_else(String::new, |m| m.to_string()),
                    i.periodicity
                )?;
            }
            Ok(())
        },
        |rows, w| {
            pretty_section(w, &format!("Indicators ({})", rows.len()))?;
            for i in rows {
                let window = match (i.start_month, i.end_month) {
                    (Some(s), Some(e)) => format!("{s}..{e}"),
                    (Some(s), None) => format!("{s}.."),
                    (None, Some(e)) => format!("..{e}"),
                    (None, None) => "-".to_string(),
                };
                writeln!(
                    w,
                    "{:>4}  {:<28} {:<11} {:>12}  every {:>2}m  {window}",
                    i.id,
                    i.name,
                    i.direction.as_str(),
                    i.target_value.to_string(),
                    i.periodicity.months()
                )?;
            }
            Ok(())
        },
    )
}

fn run_show(args: &ShowArgs, session: &Session) -> Result<()> {
    let conn = session.open()?;
    let indicator = indicators::get(&conn, args.id)?.ok_or(MetasError::IndicatorNotFound(args.id))?;
    let detail = IndicatorDetail {
        sector: sectors::get(&conn, indicator.sector_id)?,
        targets: targets::list_for(&conn, indicator.id)?,
        submissions: submissions::list_for(&conn, indicator.id)?,
        indicator,
    };

    render_mode(
        session.output,
        &detail,
        |d, w| {
            writeln!(w, "indicator\t{}\t{}", d.indicator.id, d.indicator.name)?;
            for t in &d.targets {
                writeln!(w, "target\t{}\t{}", t.month, t.target_value)?;
            }
            for s in &d.submissions {
                writeln!(
                    w,
                    "submission\t{}\t{}\t{}\t{}\t{}",
                    s.id,
                    s.competence,
                    s.value.map_or_else(|| "-".to_string(), |v| v.to_string()),
                    if s.is_pending() { "pending" } else { "confirmed" },
                    s.submitted_by.as_deref().unwrap_or("-")
                )?;
            }
            Ok(())
        },
        |d, w| {
            let ind = &d.indicator;
            pretty_section(w, &format!("Indicator {}: {}", ind.id, ind.name))?;
            pretty_kv(w, "Sector", d.sector.as_ref().map_or("-", |s| s.name.as_str()))?;
            pretty_kv(w, "Direction", ind.direction.as_str())?;
            pretty_kv(w, "Target", format!("{} ({})", ind.target_value, ind.value_kind))?;
            pretty_kv(w, "Start", ind.start_month.map_or_else(|| "-".to_string(), |m| m.to_string()))?;
            pretty_kv(w, "End", ind.end_month.map_or_else(|| "-".to_string(), |m| m.to_string()))?;
            pretty_kv(w, "Periodicity", format!("{} month(s)", ind.periodicity))?;
            pretty_kv(w, "Active", if ind.active { "yes" } else { "no" })?;
            if !ind.instructions.is_empty() {
                pretty_kv(w, "Instructions", &ind.instructions)?;
            }
            writeln!(w)?;
            pretty_section(w, &format!("Targets ({})", d.targets.len()))?;
            for t in &d.targets {
                writeln!(w, "  {}  {:>12}", t.month, t.target_value.to_string())?;
            }
            writeln!(w)?;
            pretty_section(w, &format!("Submissions ({})", d.submissions.len()))?;
            for s in &d.submissions {
                writeln!(
                    w,
                    "  #{:<5} {}  {:>12}  {:<9}  {}",
                    s.id,
                    s.competence,
                    s.value.map_or_else(|| "-".to_string(), |v| v.to_string()),
                    if s.is_pending() { "pending" } else { "confirmed" },
                    s.submitted_by.as_deref().unwrap_or("-")
                )?;
            }
            Ok(())
        },
    )
}

fn run_remove(args: &RemoveArgs, session: &Session) -> Result<()> {
    let mut conn = session.open()?;
    let removed = lifecycle::remove_indicator(
        &mut conn,
        &session.clock,
        session.actor(args.actor.as_deref()),
        args.id,
    )
    .with_context(|| format!("remove indicator {}", args.id))?;

    render_mode(
        session.output,
        &removed,
        |r: &RemovedIndicator, w| {
            writeln!(
                w,
                "{}\t{}\ttargets={}\tsubmissions={}",
                r.indicator.id, r.indicator.name, r.targets, r.submissions
            )
        },
        |r, w| {
            writeln!(w, "✓ Removed indicator {} ({})", r.indicator.id, r.indicator.name)?;
            pretty_kv(w, "Targets", r.targets.to_string())?;
            pretty_kv(w, "Submissions", r.submissions.to_string())
        },
    )
}
