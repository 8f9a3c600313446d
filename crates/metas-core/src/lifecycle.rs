//! Indicator create/update and submission recording.
//!
//! Each operation validates, writes, reconciles targets where the schedule
//! may have changed and appends to the action log, all in one transaction.

use rusqlite::Connection;
use serde::Serialize;

use crate::amount::Amount;
use crate::calendar::Month;
use crate::clock::Clock;
use crate::db::submissions::SubmissionWrite;
use crate::db::{audit, indicators, sectors, submissions, targets};
use crate::error::{MetasError, Result};
use crate::model::{Indicator, Periodicity, TargetDirection, ValueKind, validate_range};
use crate::reconcile::{ReconcileReport, default_horizon, fill_placeholders_in, reconcile_in};
use crate::schedule::resolve_anchor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIndicator {
    pub name: String,
    /// Sector name; created when missing.
    pub sector: String,
    pub direction: TargetDirection,
    pub target_value: Amount,
    pub value_kind: ValueKind,
    pub start_month: Option<Month>,
    pub end_month: Option<Month>,
    pub periodicity: i64,
    pub active: bool,
    pub visible: bool,
    pub instructions: String,
    /// Origin tag for pending placeholders over the elapsed competences;
    /// `None` creates none.
    pub placeholder_origin: Option<String>,
}

/// Field updates; `None` leaves a field unchanged. The nested options on
/// the months allow clearing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorChanges {
    pub name: Option<String>,
    pub sector: Option<String>,
    pub direction: Option<TargetDirection>,
    pub target_value: Option<Amount>,
    pub value_kind: Option<ValueKind>,
    pub start_month: Option<Option<Month>>,
    pub end_month: Option<Option<Month>>,
    pub periodicity: Option<i64>,
    pub active: Option<bool>,
    pub visible: Option<bool>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedIndicator {
    pub indicator: Indicator,
    pub reconcile: ReconcileReport,
    /// Pending submissions created for elapsed competences.
    pub placeholders: usize,
    /// Rows removed because the start month moved forward.
    pub purged_targets: usize,
    pub purged_submissions: usize,
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(MetasError::InvalidInput("indicator name must not be blank".into()));
    }
    Ok(trimmed.to_string())
}

/// Create an indicator and its initial targets.
///
/// # Errors
///
/// Returns a validation error (blank name, periodicity outside 1..=12, end
/// before start) before anything is written, or a storage error.
pub fn create_indicator(
    conn: &mut Connection,
    clock: &dyn Clock,
    actor: Option<&str>,
    new: &NewIndicator,
) -> Result<SavedIndicator> {
    let name = validate_name(&new.name)?;
    let periodicity = Periodicity::new(new.periodicity)?;
    validate_range(new.start_month, new.end_month)?;

    let tx = conn.transaction()?;
    let sector_id = sectors::upsert_by_name(&tx, &new.sector)?;

    let mut indicator = Indicator {
        id: 0,
        name,
        sector_id,
        direction: new.direction,
        target_value: new.target_value,
        value_kind: new.value_kind,
        start_month: new.start_month,
        end_month: new.end_month,
        periodicity,
        active: new.active,
        visible: new.visible,
        instructions: new.instructions.clone(),
        created_on: Some(clock.today()),
    };
    indicator.id = indicators::insert(&tx, &indicator)?;

    let (horizon, hard_cap) = default_horizon(&indicator, clock);
    let reconcile = reconcile_in(&tx, &indicator, horizon, hard_cap)?;
    let placeholders = match &new.placeholder_origin {
        Some(origin) => fill_placeholders_in(&tx, &indicator, clock.last_elapsed_month(), origin)?,
        None => 0,
    };

    audit::record(
        &tx,
        actor,
        &format!("create indicator {} '{}'", indicator.id, indicator.name),
        clock.now(),
    )?;
    tx.commit()?;

    tracing::info!(
        indicator_id = indicator.id,
        created = reconcile.created,
        placeholders,
        "created indicator"
    );
    Ok(SavedIndicator {
        indicator,
        reconcile,
        placeholders,
        purged_targets: 0,
        purged_submissions: 0,
    })
}

/// Apply `changes` to an indicator and re-reconcile its targets.
///
/// When the anchor moves forward, targets and pending submissions before
/// the new anchor are removed. Confirmed submissions are kept, including
/// rows that hold a value without the confirmed flag.
///
/// # Errors
///
/// Returns [`MetasError::IndicatorNotFound`], a validation error on the
/// merged state, or a storage error. Nothing is written on error.
pub fn update_indicator(
    conn: &mut Connection,
    clock: &dyn Clock,
    actor: Option<&str>,
    indicator_id: i64,
    changes: &IndicatorChanges,
) -> Result<SavedIndicator> {
    let tx = conn.transaction()?;
    let before =
        indicators::get(&tx, indicator_id)?.ok_or(MetasError::IndicatorNotFound(indicator_id))?;

    let mut after = before.clone();
    if let Some(name) = &changes.name {
        after.name = validate_name(name)?;
    }
    if let Some(periodicity) = changes.periodicity {
        after.periodicity = Periodicity::new(periodicity)?;
    }
    if let Some(start) = changes.start_month {
        after.start_month = start;
    }
    if let Some(end) = changes.end_month {
        after.end_month = end;
    }
    after.validate_range()?;

    if let Some(sector) = &changes.sector {
        after.sector_id = sectors::upsert_by_name(&tx, sector)?;
    }
    if let Some(direction) = changes.direction {
        after.direction = direction;
    }
    if let Some(target_value) = changes.target_value {
        after.target_value = target_value;
    }
    if let Some(value_kind) = changes.value_kind {
        after.value_kind = value_kind;
    }
    if let Some(active) = changes.active {
        after.active = active;
    }
    if let Some(visible) = changes.visible {
        after.visible = visible;
    }
    if let Some(instructions) = &changes.instructions {
        after.instructions.clone_from(instructions);
    }

    indicators::update(&tx, &after)?;

    let mut purged_targets = 0;
    let mut purged_submissions = 0;
    let new_anchor = resolve_anchor(&after)?;
    if resolve_anchor(&before).is_ok_and(|old| new_anchor > old) {
        purged_targets = targets::delete_before(&tx, indicator_id, new_anchor)?;
        purged_submissions = submissions::delete_pending_before(&tx, indicator_id, new_anchor)?;
        tracing::debug!(
            indicator_id,
            %new_anchor,
            purged_targets,
            purged_submissions,
            "anchor moved forward"
        );
    }

    let (horizon, hard_cap) = default_horizon(&after, clock);
    let reconcile = reconcile_in(&tx, &after, horizon, hard_cap)?;

    audit::record(
        &tx,
        actor,
        &format!("update indicator {indicator_id}"),
        clock.now(),
    )?;
    tx.commit()?;

    tracing::info!(
        indicator_id,
        created = reconcile.created,
        removed = reconcile.removed,
        "updated indicator"
    );
    Ok(SavedIndicator {
        indicator: after,
        reconcile,
        placeholders: 0,
        purged_targets,
        purged_submissions,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedIndicator {
    pub indicator: Indicator,
    pub targets: usize,
    pub submissions: usize,
}

/// Delete an indicator together with its targets and submissions.
///
/// # Errors
///
/// Returns [`MetasError::IndicatorNotFound`] or a storage error. Nothing is
/// written on error.
pub fn remove_indicator(
    conn: &mut Connection,
    clock: &dyn Clock,
    actor: Option<&str>,
    indicator_id: i64,
) -> Result<RemovedIndicator> {
    let tx = conn.transaction()?;
    let indicator =
        indicators::get(&tx, indicator_id)?.ok_or(MetasError::IndicatorNotFound(indicator_id))?;
    let removed = RemovedIndicator {
        targets: targets::list_for(&tx, indicator_id)?.len(),
        submissions: submissions::list_for(&tx, indicator_id)?.len(),
        indicator,
    };

    indicators::delete(&tx, indicator_id)?;
    audit::record(
        &tx,
        actor,
        &format!("remove indicator {indicator_id} '{}'", removed.indicator.name),
        clock.now(),
    )?;
    tx.commit()?;

    tracing::info!(
        indicator_id,
        targets = removed.targets,
        submissions = removed.submissions,
        "removed indicator"
    );
    Ok(removed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission<'a> {
    pub indicator_id: i64,
    pub competence: Month,
    pub actor: Option<&'a str>,
    pub value: Option<Amount>,
    pub origin: Option<&'a str>,
    pub evidence: Option<&'a str>,
    pub comment: Option<&'a str>,
}

/// Record a value (or a pending row when `value` is `None`) for one
/// competence, updating the actor's existing row if there is one.
///
/// # Errors
///
/// Returns [`MetasError::IndicatorNotFound`], or
/// [`MetasError::ConfirmedOverwrite`] when `value` is `None` and the row is
/// already confirmed.
pub fn record_submission(
    conn: &mut Connection,
    clock: &dyn Clock,
    new: &NewSubmission<'_>,
) -> Result<i64> {
    let tx = conn.transaction()?;
    if indicators::get(&tx, new.indicator_id)?.is_none() {
        return Err(MetasError::IndicatorNotFound(new.indicator_id));
    }

    if let Some(existing) = submissions::find(&tx, new.indicator_id, new.competence, new.actor)? {
        if existing.is_effectively_confirmed() && new.value.is_none() {
            return Err(MetasError::ConfirmedOverwrite(existing.id));
        }
    }

    let at = clock.now();
    let id = submissions::upsert(
        &tx,
        &SubmissionWrite {
            indicator_id: new.indicator_id,
            competence: new.competence,
            submitted_by: new.actor,
            value: new.value,
            origin: new.origin,
            evidence: new.evidence,
            comment: new.comment,
            at,
        },
    )?;

    let shown = new.value.map_or_else(|| "pending".to_string(), |v| v.to_string());
    audit::record(
        &tx,
        new.actor,
        &format!("submit indicator {} {} = {shown}", new.indicator_id, new.competence),
        at,
    )?;
    tx.commit()?;

    tracing::debug!(
        indicator_id = new.indicator_id,
        competence = %new.competence,
        submission_id = id,
        "recorded submission"
    );
    Ok(id)
}
