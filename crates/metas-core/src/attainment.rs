//! Whether realized values meet their targets.

use std::collections::BTreeSet;

use rusqlite::Connection;
use serde::Serialize;

use crate::amount::Amount;
use crate::calendar::Month;
use crate::db::{submissions, targets};
use crate::error::Result;
use crate::model::{Indicator, TargetDirection};

/// Default allowed distance for monitoring indicators.
pub const DEFAULT_MONITORING_TOLERANCE: Amount = Amount::from_hundredths(500);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Attainment {
    pub met: bool,
    /// `(realized - target) / target * 100`, or 0 for a zero target.
    pub variation_pct: f64,
}

#[must_use]
pub fn evaluate(
    direction: TargetDirection,
    realized: Amount,
    target: Amount,
    tolerance: Amount,
) -> Attainment {
    let met = match direction {
        TargetDirection::Increasing => realized >= target,
        TargetDirection::Decreasing => realized <= target,
        TargetDirection::Monitoring => {
            realized.abs_diff(target) <= tolerance.hundredths().unsigned_abs()
        }
    };

    let variation_pct = if target.is_zero() {
        0.0
    } else {
        (realized.to_f64() - target.to_f64()) / target.to_f64() * 100.0
    };

    Attainment { met, variation_pct }
}

/// One competence of the status report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRow {
    pub competence: Month,
    pub target: Amount,
    pub realized: Option<Amount>,
    pub attainment: Option<Attainment>,
}

/// Target versus latest confirmed value for every competence that has a
/// target row or a confirmed submission. Competences without a target row
/// fall back to the indicator's default target.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn status(conn: &Connection, indicator: &Indicator, tolerance: Amount) -> Result<Vec<StatusRow>> {
    let target_rows = targets::list_for(conn, indicator.id)?;
    let realized = submissions::latest_confirmed_values(conn, indicator.id)?;

    let competences: BTreeSet<Month> = target_rows
        .iter()
        .map(|t| t.month)
        .chain(realized.keys().copied())
        .collect();

    Ok(competences
        .into_iter()
        .map(|competence| {
            let target = target_rows
                .iter()
                .find(|t| t.month == competence)
                .map_or(indicator.target_value, |t| t.target_value);
            let value = realized.get(&competence).copied();
            StatusRow {
                competence,
                target,
                realized: value,
                attainment: value.map(|v| evaluate(indicator.direction, v, target, tolerance)),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::submissions::tests::{raw_insert, seeded, ym};

    fn amt(hundredths: i64) -> Amount {
        Amount::from_hundredths(hundredths)
    }

    #[test]
    fn direction_rules() {
        let tol = DEFAULT_MONITORING_TOLERANCE;
        assert!(evaluate(TargetDirection::Increasing, amt(100), amt(100), tol).met);
        assert!(!evaluate(TargetDirection::Increasing, amt(99), amt(100), tol).met);
        assert!(evaluate(TargetDirection::Decreasing, amt(80), amt(100), tol).met);
        assert!(!evaluate(TargetDirection::Decreasing, amt(101), amt(100), tol).met);
    }

    #[test]
    fn monitoring_uses_the_tolerance_band() {
        let tol = DEFAULT_MONITORING_TOLERANCE;
        assert!(evaluate(TargetDirection::Monitoring, amt(10_500), amt(10_000), tol).met);
        assert!(evaluate(TargetDirection::Monitoring, amt(9_500), amt(10_000), tol).met);
        assert!(!evaluate(TargetDirection::Monitoring, amt(10_501), amt(10_000), tol).met);
    }

    #[test]
    fn variation_is_relative_to_target() {
        let got = evaluate(TargetDirection::Increasing, amt(15_000), amt(10_000), Amount::ZERO);
        assert!((got.variation_pct - 50.0).abs() < 1e-9);

        let zero = evaluate(TargetDirection::Increasing, amt(15_000), Amount::ZERO, Amount::ZERO);
        assert!(zero.variation_pct.abs() < f64::EPSILON);
        assert!(zero.met);
    }

    #[test]
    fn status_joins_targets_and_latest_confirmed_values() {
        let (conn, id) = seeded();
        targets::insert_if_absent(&conn, id, ym(2025, 1), amt(100_000)).expect("target");
        targets::insert_if_absent(&conn, id, ym(2025, 2), amt(100_000)).expect("target");
        raw_insert(&conn, id, ym(2025, 1), Some(90_000), true, Some("ana"));
        raw_insert(&conn, id, ym(2025, 1), Some(120_000), true, Some("bia"));
        raw_insert(&conn, id, ym(2025, 3), Some(200_000), true, Some("ana"));

        let indicator = crate::db::indicators::get(&conn, id).expect("get").expect("present");
        let rows = status(&conn, &indicator, DEFAULT_MONITORING_TOLERANCE).expect("status");

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].realized, Some(amt(120_000)));
        assert!(rows[0].attainment.is_some_and(|a| a.met));
        assert_eq!(rows[1].realized, None);
        assert!(rows[1].attainment.is_none());
        assert_eq!(rows[2].target, indicator.target_value);
    }
}
