//! Monthly target rows.

use rusqlite::{Connection, params};

use crate::amount::Amount;
use crate::calendar::Month;
use crate::error::Result;
use crate::model::MonthlyTarget;

/// All targets of one indicator, ordered by month.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_for(conn: &Connection, indicator_id: i64) -> Result<Vec<MonthlyTarget>> {
    let mut stmt = conn.prepare(
        "SELECT target_id, indicator_id, month, target_value FROM monthly_targets \
         WHERE indicator_id = ?1 ORDER BY month",
    )?;
    let rows = stmt.query_map(params![indicator_id], |row| {
        Ok(MonthlyTarget {
            id: row.get(0)?,
            indicator_id: row.get(1)?,
            month: row.get(2)?,
            target_value: row.get(3)?,
        })
    })?;
    let mut targets = Vec::new();
    for row in rows {
        targets.push(row?);
    }
    Ok(targets)
}

/// Insert a target unless one already exists for `(indicator, month)`.
///
/// Returns `true` when a row was written. A concurrent writer that got there
/// first is not an error.
///
/// # Errors
///
/// Returns an error if the insert fails for another reason.
pub fn insert_if_absent(
    conn: &Connection,
    indicator_id: i64,
    month: Month,
    target_value: Amount,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO monthly_targets (indicator_id, month, target_value) VALUES (?1, ?2, ?3) \
         ON CONFLICT(indicator_id, month) DO NOTHING",
        params![indicator_id, month, target_value],
    )?;
    Ok(inserted > 0)
}

/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_ids(conn: &Connection, ids: &[i64]) -> Result<usize> {
    Ok(super::delete_by_ids(conn, "monthly_targets", "target_id", ids)?)
}

/// Delete every target of `indicator_id` with month strictly after `month`.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_after(conn: &Connection, indicator_id: i64, month: Month) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM monthly_targets WHERE indicator_id = ?1 AND month > ?2",
        params![indicator_id, month],
    )?)
}

/// Delete every target of `indicator_id` with month strictly before `month`.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_before(conn: &Connection, indicator_id: i64, month: Month) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM monthly_targets WHERE indicator_id = ?1 AND month < ?2",
        params![indicator_id, month],
    )?)
}

/// Count targets with month on or after `from`, optionally for one indicator.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_from(conn: &Connection, from: Month, indicator_id: Option<i64>) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM monthly_targets \
         WHERE month >= ?1 AND (?2 IS NULL OR indicator_id = ?2)",
        params![from, indicator_id],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Delete targets with month on or after `from`, optionally for one indicator.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_from(conn: &Connection, from: Month, indicator_id: Option<i64>) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM monthly_targets WHERE month >= ?1 AND (?2 IS NULL OR indicator_id = ?2)",
        params![from, indicator_id],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::indicators::{self, tests::sample};
    use crate::db::{open_in_memory, sectors};

    fn ym(year: i32, month: u32) -> Month {
        Month::from_ym(year, month).expect("valid month")
    }

    fn seeded() -> (Connection, i64) {
        let conn = open_in_memory().expect("db");
        let sector = sectors::upsert_by_name(&conn, "Finance").expect("sector");
        let id = indicators::insert(&conn, &sample(sector)).expect("indicator");
        (conn, id)
    }

    fn months(conn: &Connection, id: i64) -> Vec<Month> {
        list_for(conn, id)
            .expect("list")
            .into_iter()
            .map(|t| t.month)
            .collect()
    }

    #[test]
    fn duplicate_insert_is_absorbed() {
        let (conn, id) = seeded();
        let value = Amount::from_hundredths(100);
        assert!(insert_if_absent(&conn, id, ym(2025, 1), value).expect("first"));
        assert!(!insert_if_absent(&conn, id, ym(2025, 1), value).expect("second"));
        assert_eq!(months(&conn, id), vec![ym(2025, 1)]);
    }

    #[test]
    fn stored_month_is_day_one_text() {
        let (conn, id) = seeded();
        insert_if_absent(&conn, id, ym(2025, 7), Amount::ZERO).expect("insert");
        let raw: String = conn
            .query_row("SELECT month FROM monthly_targets", [], |row| row.get(0))
            .expect("raw month");
        assert_eq!(raw, "2025-07-01");
    }

    #[test]
    fn range_deletes_are_strict() {
        let (conn, id) = seeded();
        for m in 1..=6 {
            insert_if_absent(&conn, id, ym(2025, m), Amount::ZERO).expect("insert");
        }

        assert_eq!(delete_after(&conn, id, ym(2025, 5)).expect("after"), 1);
        assert_eq!(delete_before(&conn, id, ym(2025, 2)).expect("before"), 1);
        assert_eq!(
            months(&conn, id),
            vec![ym(2025, 2), ym(2025, 3), ym(2025, 4), ym(2025, 5)]
        );
    }

    #[test]
    fn from_helpers_respect_indicator_filter() {
        let (conn, id) = seeded();
        let sector = sectors::upsert_by_name(&conn, "Finance").expect("sector");
        let other = indicators::insert(&conn, &sample(sector)).expect("indicator");
        for m in [3, 4, 5] {
            insert_if_absent(&conn, id, ym(2025, m), Amount::ZERO).expect("insert");
            insert_if_absent(&conn, other, ym(2025, m), Amount::ZERO).expect("insert");
        }

        assert_eq!(count_from(&conn, ym(2025, 4), None).expect("count"), 4);
        assert_eq!(count_from(&conn, ym(2025, 4), Some(id)).expect("count"), 2);
        assert_eq!(delete_from(&conn, ym(2025, 4), Some(other)).expect("delete"), 2);
        assert_eq!(months(&conn, other), vec![ym(2025, 3)]);
        assert_eq!(months(&conn, id).len(), 3);
    }

    #[test]
    fn delete_ids_removes_only_listed_rows() {
        let (conn, id) = seeded();
        for m in 1..=3 {
            insert_if_absent(&conn, id, ym(2025, m), Amount::ZERO).expect("insert");
        }
        let first = list_for(&conn, id).expect("list")[0].id;
        assert_eq!(delete_ids(&conn, &[first]).expect("delete"), 1);
        assert_eq!(months(&conn, id), vec![ym(2025, 2), ym(2025, 3)]);
        assert_eq!(delete_ids(&conn, &[]).expect("noop"), 0);
    }
}
