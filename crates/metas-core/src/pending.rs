//! Competences still waiting for a confirmed value.

use rusqlite::Connection;
use serde::Serialize;

use crate::calendar::Month;
use crate::clock::Clock;
use crate::db::{indicators, submissions};
use crate::error::Result;
use crate::model::ValueKind;
use crate::schedule::allowed_competences;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCompetence {
    pub indicator_id: i64,
    pub name: String,
    pub sector_id: i64,
    pub competence: Month,
    pub value_kind: ValueKind,
    pub instructions: String,
}

/// Allowed competences up to and including the current month that have no
/// confirmed submission, across active indicators.
///
/// With an `actor`, only that actor's confirmed rows count. Indicators whose
/// anchor cannot be resolved are skipped with a warning.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn pending_competences(
    conn: &Connection,
    clock: &dyn Clock,
    actor: Option<&str>,
    sector_id: Option<i64>,
) -> Result<Vec<PendingCompetence>> {
    let horizon = clock.current_month();
    let filter = indicators::IndicatorFilter {
        active_only: true,
        id: None,
        sector_id,
    };

    let mut pending = Vec::new();
    for indicator in indicators::list(conn, filter)? {
        let allowed = match allowed_competences(&indicator, horizon) {
            Ok(allowed) => allowed,
            Err(err) => {
                tracing::warn!(indicator_id = indicator.id, error = %err, "skipping indicator");
                continue;
            }
        };
        let done = submissions::confirmed_competences(conn, indicator.id, actor)?;

        pending.extend(allowed.difference(&done).map(|competence| PendingCompetence {
            indicator_id: indicator.id,
            name: indicator.name.clone(),
            sector_id: indicator.sector_id,
            competence: *competence,
            value_kind: indicator.value_kind,
            instructions: indicator.instructions.clone(),
        }));
    }
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::indicators::tests::sample;
    use crate::db::sectors;
    use crate::db::submissions::tests::{raw_insert, seeded, ym};
    use chrono::NaiveDate;

    fn clock() -> FixedClock {
        FixedClock::on(NaiveDate::from_ymd_opt(2025, 3, 15).expect("date"))
    }

    fn competences(rows: &[PendingCompetence]) -> Vec<(i64, Month)> {
        rows.iter().map(|p| (p.indicator_id, p.competence)).collect()
    }

    #[test]
    fn lists_unconfirmed_competences_through_current_month() {
        let (conn, id) = seeded();
        raw_insert(&conn, id, ym(2025, 2), Some(100), true, Some("ana"));
        raw_insert(&conn, id, ym(2025, 3), None, false, None);

        let rows = pending_competences(&conn, &clock(), None, None).expect("pending");
        assert_eq!(competences(&rows), vec![(id, ym(2025, 1)), (id, ym(2025, 3))]);
        assert_eq!(rows[0].instructions, "From the ledger");
    }

    #[test]
    fn actor_filter_counts_only_their_rows() {
        let (conn, id) = seeded();
        raw_insert(&conn, id, ym(2025, 1), Some(100), true, Some("bia"));

        let for_ana = pending_competences(&conn, &clock(), Some("ana"), None).expect("ana");
        assert_eq!(for_ana.len(), 3);
        let for_bia = pending_competences(&conn, &clock(), Some("bia"), None).expect("bia");
        assert_eq!(for_bia.len(), 2);
    }

    #[test]
    fn sector_filter_and_unanchored_indicators() {
        let (conn, id) = seeded();
        let ops = sectors::upsert_by_name(&conn, "Ops").expect("sector");
        let mut unanchored = sample(ops);
        unanchored.start_month = None;
        unanchored.created_on = None;
        indicators::insert(&conn, &unanchored).expect("insert");

        let all = pending_competences(&conn, &clock(), None, None).expect("all");
        assert!(all.iter().all(|p| p.indicator_id == id));

        let ops_only = pending_competences(&conn, &clock(), None, Some(ops)).expect("ops");
        assert!(ops_only.is_empty());
    }
}
