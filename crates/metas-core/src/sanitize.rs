//! Submission sanitizer.
//!
//! Brings every active indicator's submissions back to a clean state inside
//! a competence window ending at the last fully elapsed month:
//!
//! - a confirmed row supersedes every pending row of its competence
//! - at most one pending row per allowed competence, the lowest id
//! - pending rows hold `NULL`, never zero
//! - no pending rows outside the allowed set
//! - every allowed competence has a row, unless creation is disabled
//!
//! [`plan_indicator`] is pure; [`run`] feeds the same plan to both dry-run
//! reporting and the writes.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use rusqlite::Connection;
use serde::Serialize;

use crate::calendar::Month;
use crate::clock::Clock;
use crate::db::{audit, indicators, submissions};
use crate::error::{MetasError, Result};
use crate::model::{Indicator, Submission};
use crate::schedule::Schedule;

pub const DEFAULT_PLACEHOLDER_ORIGIN: &str = "sanitizer-placeholder";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeOptions {
    pub indicator_id: Option<i64>,
    /// First competence considered, inclusive.
    pub since: Option<Month>,
    /// Last competence considered, inclusive. Never extends past the last
    /// elapsed month.
    pub until: Option<Month>,
    pub create_missing: bool,
    pub hard_cap: bool,
    pub dry_run: bool,
    pub placeholder_origin: String,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            indicator_id: None,
            since: None,
            until: None,
            create_missing: true,
            hard_cap: false,
            dry_run: true,
            placeholder_origin: DEFAULT_PLACEHOLDER_ORIGIN.to_string(),
        }
    }
}

/// Inclusive competence range a plan may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub since: Option<Month>,
    pub horizon: Month,
}

impl Window {
    #[must_use]
    pub fn contains(&self, month: Month) -> bool {
        self.since.is_none_or(|since| month >= since) && month <= self.horizon
    }
}

/// One decision about one competence, reported under `--verbose`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CompetenceAction {
    /// Confirmed flag rewritten to match the value.
    Flag { competence: Month, id: i64, confirmed: bool },
    SetNull { competence: Month, id: i64 },
    /// Pending rows dropped because confirmed row `by` exists.
    Superseded { competence: Month, by: i64, drop: Vec<i64> },
    /// Pending rows for a competence outside the allowed set.
    OutOfPeriod { competence: Month, drop: Vec<i64> },
    /// Pending rows after the end month, dropped under the hard cap.
    PastEnd { competence: Month, drop: Vec<i64> },
    Dedup { competence: Month, keep: i64, drop: Vec<i64> },
    Create { competence: Month },
}

impl CompetenceAction {
    #[must_use]
    pub const fn competence(&self) -> Month {
        match self {
            Self::Flag { competence, .. }
            | Self::SetNull { competence, .. }
            | Self::Superseded { competence, .. }
            | Self::OutOfPeriod { competence, .. }
            | Self::PastEnd { competence, .. }
            | Self::Dedup { competence, .. }
            | Self::Create { competence } => *competence,
        }
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

impl fmt::Display for CompetenceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag { competence, id, confirmed } => {
                write!(f, "[flag] {competence} id={id} confirmed={confirmed}")
            }
            Self::SetNull { competence, id } => write!(f, "[set_null] {competence} id={id}"),
            Self::Superseded { competence, by, drop } => {
                write!(f, "[superseded] {competence} by={by} drop={}", join_ids(drop))
            }
            Self::OutOfPeriod { competence, drop } => {
                write!(f, "[out_of_period] {competence} drop={}", join_ids(drop))
            }
            Self::PastEnd { competence, drop } => {
                write!(f, "[past_end] {competence} drop={}", join_ids(drop))
            }
            Self::Dedup { competence, keep, drop } => {
                write!(f, "[dedup] {competence} keep={keep} drop={}", join_ids(drop))
            }
            Self::Create { competence } => write!(f, "[create] {competence}"),
        }
    }
}

/// Row-level changes for one indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorPlan {
    /// Pending rows holding a non-zero value.
    pub confirm: Vec<i64>,
    /// Confirmed rows without a value.
    pub unconfirm: Vec<i64>,
    pub set_null: Vec<i64>,
    /// Superseded, out-of-period and past-end pending rows.
    pub delete: Vec<i64>,
    pub dedup: Vec<i64>,
    pub create: Vec<Month>,
    /// The same changes grouped by competence, in competence order.
    pub actions: Vec<CompetenceAction>,
}

impl IndicatorPlan {
    #[must_use]
    pub fn counts(&self) -> PlanCounts {
        PlanCounts {
            set_null: self.set_null.len(),
            deleted: self.delete.len(),
            created: self.create.len(),
            dedup: self.dedup.len(),
            flags_repaired: self.confirm.len() + self.unconfirm.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts() == PlanCounts::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanCounts {
    pub set_null: usize,
    pub deleted: usize,
    pub created: usize,
    pub dedup: usize,
    pub flags_repaired: usize,
}

impl PlanCounts {
    fn absorb(&mut self, other: Self) {
        self.set_null += other.set_null;
        self.deleted += other.deleted;
        self.created += other.created;
        self.dedup += other.dedup;
        self.flags_repaired += other.flags_repaired;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorOutcome {
    pub indicator_id: i64,
    pub name: String,
    pub horizon: Month,
    #[serde(flatten)]
    pub counts: PlanCounts,
    pub actions: Vec<CompetenceAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanitizeReport {
    pub dry_run: bool,
    #[serde(flatten)]
    pub totals: PlanCounts,
    pub processed: usize,
    pub skipped: usize,
    #[serde(skip)]
    pub elapsed: Duration,
    pub elapsed_ms: u64,
    pub indicators: Vec<IndicatorOutcome>,
}

/// Compute the changes that bring `rows` in line with `schedule`.
///
/// `rows` are all submissions of one indicator. Only rows inside `window`
/// are considered, except that under `hard_cap` pending rows after the
/// schedule's end are deleted wherever they fall.
#[must_use]
pub fn plan_indicator(
    schedule: &Schedule,
    rows: &[Submission],
    window: Window,
    hard_cap: bool,
    create_missing: bool,
) -> IndicatorPlan {
    let allowed = schedule.allowed_until(window.horizon);
    let mut plan = IndicatorPlan::default();

    let mut groups: BTreeMap<Month, Vec<&Submission>> = BTreeMap::new();
    let mut past_end: BTreeMap<Month, Vec<i64>> = BTreeMap::new();
    for row in rows {
        if window.contains(row.competence) {
            groups.entry(row.competence).or_default().push(row);
        } else if hard_cap
            && schedule.end.is_some_and(|end| row.competence > end)
            && row.is_pending()
        {
            plan.delete.push(row.id);
            past_end.entry(row.competence).or_default().push(row.id);
        }
    }
    for (competence, mut drop) in past_end {
        drop.sort_unstable();
        plan.actions.push(CompetenceAction::PastEnd { competence, drop });
    }

    for (&competence, group) in &mut groups {
        group.sort_by_key(|row| row.id);
        let (confirmed, pending): (Vec<&Submission>, Vec<&Submission>) =
            group.iter().copied().partition(|row| row.is_effectively_confirmed());

        for row in &confirmed {
            if !row.confirmed {
                plan.confirm.push(row.id);
                plan.actions.push(CompetenceAction::Flag {
                    competence,
                    id: row.id,
                    confirmed: true,
                });
            }
        }

        let pending_ids: Vec<i64> = pending.iter().map(|row| row.id).collect();
        if let Some(by) = confirmed.first() {
            if !pending_ids.is_empty() {
                plan.delete.extend(&pending_ids);
                plan.actions.push(CompetenceAction::Superseded {
                    competence,
                    by: by.id,
                    drop: pending_ids,
                });
            }
        } else if allowed.contains(&competence) {
            if let Some((keep, rest)) = pending.split_first() {
                if keep.value.is_some() {
                    plan.set_null.push(keep.id);
                    plan.actions.push(CompetenceAction::SetNull { competence, id: keep.id });
                } else if keep.confirmed {
                    plan.unconfirm.push(keep.id);
                    plan.actions.push(CompetenceAction::Flag {
                        competence,
                        id: keep.id,
                        confirmed: false,
                    });
                }
                if !rest.is_empty() {
                    let drop: Vec<i64> = rest.iter().map(|row| row.id).collect();
                    plan.dedup.extend(&drop);
                    plan.actions.push(CompetenceAction::Dedup { competence, keep: keep.id, drop });
                }
            }
        } else if !pending_ids.is_empty() {
            plan.delete.extend(&pending_ids);
            plan.actions.push(CompetenceAction::OutOfPeriod { competence, drop: pending_ids });
        }
    }

    if create_missing {
        plan.create = allowed
            .iter()
            .copied()
            .filter(|month| window.contains(*month) && !groups.contains_key(month))
            .collect();
        plan.actions
            .extend(plan.create.iter().map(|&competence| CompetenceAction::Create { competence }));
    }

    plan.actions.sort_by_key(CompetenceAction::competence);
    plan
}

fn apply(
    conn: &Connection,
    indicator_id: i64,
    plan: &IndicatorPlan,
    origin: &str,
) -> Result<PlanCounts> {
    let flags_repaired = submissions::set_confirmed(conn, &plan.confirm, true)?
        + submissions::set_confirmed(conn, &plan.unconfirm, false)?;
    let set_null = submissions::set_value_null(conn, &plan.set_null)?;
    let deleted = submissions::delete_ids(conn, &plan.delete)?;
    let dedup = submissions::delete_ids(conn, &plan.dedup)?;

    let mut created = 0;
    for month in &plan.create {
        if submissions::insert_placeholder_if_absent(conn, indicator_id, *month, origin)? {
            created += 1;
        }
    }

    Ok(PlanCounts {
        set_null,
        deleted,
        created,
        dedup,
        flags_repaired,
    })
}

fn horizon_for(indicator: &Indicator, clock: &dyn Clock, options: &SanitizeOptions) -> Month {
    let mut horizon = clock.last_elapsed_month();
    if let Some(until) = options.until {
        horizon = horizon.min(until);
    }
    if options.hard_cap {
        if let Some(end) = indicator.end_month {
            horizon = horizon.min(end);
        }
    }
    horizon
}

fn sanitize_one(
    conn: &mut Connection,
    indicator: &Indicator,
    schedule: &Schedule,
    window: Window,
    options: &SanitizeOptions,
) -> Result<(PlanCounts, Vec<CompetenceAction>)> {
    let tx = conn.transaction()?;
    let rows = submissions::list_for(&tx, indicator.id)?;
    let plan = plan_indicator(schedule, &rows, window, options.hard_cap, options.create_missing);

    if options.dry_run || plan.is_empty() {
        return Ok((plan.counts(), plan.actions));
    }

    let counts = apply(&tx, indicator.id, &plan, &options.placeholder_origin)?;
    tx.commit()?;
    Ok((counts, plan.actions))
}

/// Sanitize every selected indicator, one transaction each.
///
/// Indicators without a start month, rows that fail to decode and
/// indicators whose transaction fails are logged and counted as skipped. A
/// failed indicator leaves no partial writes; earlier indicators stay
/// committed.
///
/// # Errors
///
/// Returns [`MetasError::IndicatorNotFound`] when `indicator_id` names no
/// active indicator, or a storage error from the initial listing.
pub fn run(
    conn: &mut Connection,
    clock: &dyn Clock,
    options: &SanitizeOptions,
) -> Result<SanitizeReport> {
    let started = Instant::now();

    let filter = indicators::IndicatorFilter {
        active_only: true,
        id: options.indicator_id,
        sector_id: None,
    };
    let listed = indicators::list_decodable(conn, filter)?;
    let nothing_found = listed.indicators.is_empty() && listed.undecodable.is_empty();
    if let (Some(id), true) = (options.indicator_id, nothing_found) {
        return Err(MetasError::IndicatorNotFound(id));
    }

    let mut totals = PlanCounts::default();
    let mut outcomes = Vec::new();
    let mut skipped = listed.undecodable.len();

    for indicator in &listed.indicators {
        let Some(anchor) = indicator.start_month else {
            tracing::warn!(indicator_id = indicator.id, "no start month, skipping");
            skipped += 1;
            continue;
        };
        let schedule = Schedule {
            anchor,
            periodicity: indicator.periodicity,
            end: indicator.end_month,
        };
        let horizon = horizon_for(indicator, clock, options);
        let window = Window {
            since: options.since,
            horizon,
        };

        match sanitize_one(conn, indicator, &schedule, window, options) {
            Ok((counts, actions)) => {
                tracing::debug!(
                    indicator_id = indicator.id,
                    %horizon,
                    set_null = counts.set_null,
                    deleted = counts.deleted,
                    created = counts.created,
                    dedup = counts.dedup,
                    flags_repaired = counts.flags_repaired,
                    "sanitized indicator"
                );
                totals.absorb(counts);
                outcomes.push(IndicatorOutcome {
                    indicator_id: indicator.id,
                    name: indicator.name.clone(),
                    horizon,
                    counts,
                    actions,
                });
            }
            Err(err) => {
                tracing::warn!(indicator_id = indicator.id, error = %err, "sanitize failed, skipping");
                skipped += 1;
            }
        }
    }

    if !options.dry_run {
        audit::mark_sanitized(conn, clock.now())?;
    }

    let elapsed = started.elapsed();
    let report = SanitizeReport {
        dry_run: options.dry_run,
        totals,
        processed: outcomes.len(),
        skipped,
        elapsed,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        indicators: outcomes,
    };

    tracing::info!(
        dry_run = report.dry_run,
        processed = report.processed,
        skipped = report.skipped,
        set_null = totals.set_null,
        deleted = totals.deleted,
        created = totals.created,
        dedup = totals.dedup,
        elapsed_ms = report.elapsed_ms,
        "sanitize finished"
    );
    Ok(report)
}
