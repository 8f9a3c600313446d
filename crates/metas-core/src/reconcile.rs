//! Target reconciliation.
//!
//! [`reconcile`] is the one place that makes an indicator's target rows
//! match its schedule. Indicator create/update, the `reconcile` backfill and
//! tests all go through it.

use std::collections::BTreeSet;

use rusqlite::Connection;
use serde::Serialize;

use crate::calendar::Month;
use crate::clock::Clock;
use crate::db::{indicators, submissions, targets};
use crate::error::{MetasError, Result};
use crate::model::Indicator;
use crate::schedule;

/// Rows touched by one reconcile call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: usize,
    pub removed: usize,
}

/// Horizon and hard-cap used when an indicator is created or edited: the
/// end month with a hard cap when one is set, otherwise the last fully
/// elapsed month without one.
#[must_use]
pub fn default_horizon(indicator: &Indicator, clock: &dyn Clock) -> (Month, bool) {
    indicator
        .end_month
        .map_or_else(|| (clock.last_elapsed_month(), false), |end| (end, true))
}

/// Reconcile inside a transaction owned by the caller.
///
/// # Errors
///
/// Returns [`MetasError::InvalidConfiguration`] when no anchor resolves, or a
/// storage error.
pub fn reconcile_in(
    conn: &Connection,
    indicator: &Indicator,
    horizon: Month,
    hard_cap: bool,
) -> Result<ReconcileReport> {
    let allowed = schedule::allowed_competences(indicator, horizon)?;
    let existing = targets::list_for(conn, indicator.id)?;
    let present: BTreeSet<Month> = existing.iter().map(|t| t.month).collect();

    let mut report = ReconcileReport::default();
    for month in allowed.difference(&present) {
        if targets::insert_if_absent(conn, indicator.id, *month, indicator.target_value)? {
            report.created += 1;
        }
    }

    if let Some(&first) = allowed.first() {
        let stale: Vec<i64> = existing
            .iter()
            .filter(|t| t.month >= first && t.month <= horizon && !allowed.contains(&t.month))
            .map(|t| t.id)
            .collect();
        report.removed += targets::delete_ids(conn, &stale)?;
    }

    if hard_cap {
        report.removed += targets::delete_after(conn, indicator.id, horizon)?;
    }

    tracing::debug!(
        indicator_id = indicator.id,
        %horizon,
        hard_cap,
        created = report.created,
        removed = report.removed,
        "reconciled targets"
    );
    Ok(report)
}

/// Reconcile one indicator in its own transaction.
///
/// # Errors
///
/// Returns [`MetasError::InvalidConfiguration`] when no anchor resolves, or a
/// storage error. Nothing is written on error.
pub fn reconcile(
    conn: &mut Connection,
    indicator: &Indicator,
    horizon: Month,
    hard_cap: bool,
) -> Result<ReconcileReport> {
    let tx = conn.transaction()?;
    let report = reconcile_in(&tx, indicator, horizon, hard_cap)?;
    tx.commit()?;
    Ok(report)
}

/// Insert a pending placeholder submission for every allowed competence up
/// to `horizon` that has no submission row at all.
///
/// Indicators without an explicit start month get none; the creation-date
/// fallback anchors targets only.
///
/// # Errors
///
/// Returns a storage error.
pub fn fill_placeholders_in(
    conn: &Connection,
    indicator: &Indicator,
    horizon: Month,
    origin: &str,
) -> Result<usize> {
    if indicator.start_month.is_none() {
        return Ok(0);
    }
    let mut created = 0;
    for month in schedule::allowed_competences(indicator, horizon)? {
        if submissions::insert_placeholder_if_absent(conn, indicator.id, month, origin)? {
            created += 1;
        }
    }
    Ok(created)
}

/// Options for [`backfill`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillOptions<'a> {
    pub indicator_id: Option<i64>,
    /// Overrides each indicator's default horizon. An override before the
    /// end month does not trim targets past it.
    pub until: Option<Month>,
    /// Forces a hard cap at the horizon even when the indicator has no end.
    pub hard_cap: bool,
    /// Origin tag for placeholder submissions; `None` creates none.
    pub placeholder_origin: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub processed: usize,
    pub skipped: usize,
    pub created: usize,
    pub removed: usize,
    pub placeholders: usize,
}

fn backfill_one(
    conn: &mut Connection,
    clock: &dyn Clock,
    indicator: &Indicator,
    options: BackfillOptions<'_>,
) -> Result<(ReconcileReport, usize)> {
    let (default, capped) = default_horizon(indicator, clock);
    let horizon = options.until.map_or(default, |until| until.min(default));
    let hard_cap = options.hard_cap || (capped && options.until.is_none_or(|until| until >= default));

    let tx = conn.transaction()?;
    let report = reconcile_in(&tx, indicator, horizon, hard_cap)?;
    let placeholders = match options.placeholder_origin {
        Some(origin) => {
            fill_placeholders_in(&tx, indicator, horizon.min(clock.last_elapsed_month()), origin)?
        }
        None => 0,
    };
    tx.commit()?;
    Ok((report, placeholders))
}

/// Reconcile every active indicator (or one), one transaction each, and
/// fill placeholder submissions for elapsed competences when
/// `placeholder_origin` is set.
///
/// Indicators without a resolvable anchor, and rows that fail to decode, are
/// logged and skipped. A failed indicator leaves no partial writes.
///
/// # Errors
///
/// Returns [`MetasError::IndicatorNotFound`] when a requested indicator does
/// not exist, or a storage error from listing indicators. Per-indicator
/// failures are counted as skipped.
pub fn backfill(
    conn: &mut Connection,
    clock: &dyn Clock,
    options: BackfillOptions<'_>,
) -> Result<BackfillReport> {
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

    let mut report = BackfillReport {
        skipped: listed.undecodable.len(),
        ..BackfillReport::default()
    };
    for indicator in &listed.indicators {
        match backfill_one(conn, clock, indicator, options) {
            Ok((one, placeholders)) => {
                report.processed += 1;
                report.created += one.created;
                report.removed += one.removed;
                report.placeholders += placeholders;
            }
            Err(err) => {
                tracing::warn!(indicator_id = indicator.id, error = %err, "skipping indicator");
                report.skipped += 1;
            }
        }
    }

    tracing::info!(
        processed = report.processed,
        skipped = report.skipped,
        created = report.created,
        removed = report.removed,
        placeholders = report.placeholders,
        "backfill finished"
    );
    Ok(report)
}
