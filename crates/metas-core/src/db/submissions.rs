//! Submission rows.
//!
//! The competence is stored decomposed as `(year, month)`; every function
//! here takes and returns [`Month`] and converts at the boundary.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

use crate::amount::Amount;
use crate::calendar::Month;
use crate::error::Result;
use crate::model::Submission;

/// SQL form of [`Submission::is_effectively_confirmed`].
pub const CONFIRMED_SQL: &str = "(value IS NOT NULL AND (confirmed = 1 OR value <> 0))";

/// Rows that automation may remove: everything not effectively confirmed.
const PENDING_SQL: &str = "NOT (value IS NOT NULL AND (confirmed = 1 OR value <> 0))";

const SELECT_COLUMNS: &str = "SELECT submission_id, indicator_id, year, month, value, confirmed, \
     submitted_by, origin, evidence, comment FROM submissions";

/// Values written by [`upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionWrite<'a> {
    pub indicator_id: i64,
    pub competence: Month,
    pub submitted_by: Option<&'a str>,
    pub value: Option<Amount>,
    pub origin: Option<&'a str>,
    pub evidence: Option<&'a str>,
    pub comment: Option<&'a str>,
    pub at: DateTime<Utc>,
}

/// All submissions of one indicator, ordered by competence then id.
///
/// # Errors
///
/// Returns an error if the query fails or a stored competence is invalid.
pub fn list_for(conn: &Connection, indicator_id: i64) -> Result<Vec<Submission>> {
    let sql = format!("{SELECT_COLUMNS} WHERE indicator_id = ?1 ORDER BY year, month, submission_id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![indicator_id], row_to_submission)?;
    let mut submissions = Vec::new();
    for row in rows {
        submissions.push(row?);
    }
    Ok(submissions)
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn get(conn: &Connection, submission_id: i64) -> Result<Option<Submission>> {
    let sql = format!("{SELECT_COLUMNS} WHERE submission_id = ?1");
    Ok(conn
        .query_row(&sql, params![submission_id], row_to_submission)
        .optional()?)
}

/// The row for `(indicator, competence, actor)`, where a `None` actor
/// matches automation rows.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find(
    conn: &Connection,
    indicator_id: i64,
    competence: Month,
    submitted_by: Option<&str>,
) -> Result<Option<Submission>> {
    let sql = format!(
        "{SELECT_COLUMNS} WHERE indicator_id = ?1 AND year = ?2 AND month = ?3 \
         AND submitted_by IS ?4 ORDER BY submission_id LIMIT 1"
    );
    Ok(conn
        .query_row(
            &sql,
            params![
                indicator_id,
                competence.year(),
                competence.month(),
                submitted_by
            ],
            row_to_submission,
        )
        .optional()?)
}

/// Insert or update the row for `(indicator, competence, actor)`.
///
/// `confirmed` is derived from `value`. Returns the row id.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn upsert(conn: &Connection, write: &SubmissionWrite<'_>) -> Result<i64> {
    if let Some(existing) = find(conn, write.indicator_id, write.competence, write.submitted_by)? {
        conn.execute(
            "UPDATE submissions SET value = ?1, confirmed = ?2, origin = ?3, evidence = ?4, \
             comment = ?5, submitted_at = ?6 WHERE submission_id = ?7",
            params![
                write.value,
                write.value.is_some(),
                write.origin,
                write.evidence,
                write.comment,
                write.at,
                existing.id,
            ],
        )?;
        return Ok(existing.id);
    }

    let id = conn.query_row(
        "INSERT INTO submissions (indicator_id, year, month, value, confirmed, submitted_by, \
         origin, evidence, comment, submitted_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
         ON CONFLICT(indicator_id, year, month, submitted_by) DO UPDATE SET \
         value = excluded.value, confirmed = excluded.confirmed, origin = excluded.origin, \
         evidence = excluded.evidence, comment = excluded.comment, \
         submitted_at = excluded.submitted_at \
         RETURNING submission_id",
        params![
            write.indicator_id,
            write.competence.year(),
            write.competence.month(),
            write.value,
            write.value.is_some(),
            write.submitted_by,
            write.origin,
            write.evidence,
            write.comment,
            write.at,
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Insert a pending automation row for `competence` unless the competence
/// already has any row. Returns `true` when a row was written.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_placeholder_if_absent(
    conn: &Connection,
    indicator_id: i64,
    competence: Month,
    origin: &str,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO submissions (indicator_id, year, month, value, confirmed, submitted_by, origin) \
         SELECT ?1, ?2, ?3, NULL, 0, NULL, ?4 \
         WHERE NOT EXISTS ( \
             SELECT 1 FROM submissions WHERE indicator_id = ?1 AND year = ?2 AND month = ?3 \
         )",
        params![indicator_id, competence.year(), competence.month(), origin],
    )?;
    Ok(inserted > 0)
}

/// Clear the value of the listed rows and mark them pending.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn set_value_null(conn: &Connection, ids: &[i64]) -> Result<usize> {
    Ok(super::update_by_ids(
        conn,
        "UPDATE submissions SET value = NULL, confirmed = 0",
        "submission_id",
        ids,
        &[],
    )?)
}

/// # Errors
///
/// Returns an error if the update fails.
pub fn set_confirmed(conn: &Connection, ids: &[i64], confirmed: bool) -> Result<usize> {
    Ok(super::update_by_ids(
        conn,
        "UPDATE submissions SET confirmed = ?1",
        "submission_id",
        ids,
        &[&confirmed as &dyn rusqlite::ToSql],
    )?)
}

/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_ids(conn: &Connection, ids: &[i64]) -> Result<usize> {
    Ok(super::delete_by_ids(conn, "submissions", "submission_id", ids)?)
}

/// Delete pending rows of `indicator_id` whose competence precedes `month`.
/// A row holding a non-zero value is never pending, whatever its flag.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_pending_before(conn: &Connection, indicator_id: i64, month: Month) -> Result<usize> {
    let sql = format!(
        "DELETE FROM submissions \
         WHERE indicator_id = ?1 AND {PENDING_SQL} AND (year, month) < (?2, ?3)"
    );
    Ok(conn.execute(&sql, params![indicator_id, month.year(), month.month()])?)
}

/// Count pending rows with competence on or after `from`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_pending_from(
    conn: &Connection,
    from: Month,
    indicator_id: Option<i64>,
) -> Result<usize> {
    let sql = format!(
        "SELECT COUNT(*) FROM submissions \
         WHERE {PENDING_SQL} AND (year, month) >= (?1, ?2) \
         AND (?3 IS NULL OR indicator_id = ?3)"
    );
    let count: i64 = conn.query_row(
        &sql,
        params![from.year(), from.month(), indicator_id],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Delete pending rows with competence on or after `from`.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_pending_from(
    conn: &Connection,
    from: Month,
    indicator_id: Option<i64>,
) -> Result<usize> {
    let sql = format!(
        "DELETE FROM submissions \
         WHERE {PENDING_SQL} AND (year, month) >= (?1, ?2) \
         AND (?3 IS NULL OR indicator_id = ?3)"
    );
    Ok(conn.execute(&sql, params![from.year(), from.month(), indicator_id])?)
}

/// Competences of `indicator_id` holding a confirmed row, optionally only
/// rows submitted by `actor`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn confirmed_competences(
    conn: &Connection,
    indicator_id: i64,
    actor: Option<&str>,
) -> Result<BTreeSet<Month>> {
    let sql = format!(
        "SELECT DISTINCT year, month FROM submissions \
         WHERE indicator_id = ?1 AND {CONFIRMED_SQL} AND (?2 IS NULL OR submitted_by = ?2)"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![indicator_id, actor], |row| {
        competence_at(row, 0, 1)
    })?;
    let mut months = BTreeSet::new();
    for row in rows {
        months.insert(row?);
    }
    Ok(months)
}

/// Most recent confirmed value per competence.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn latest_confirmed_values(
    conn: &Connection,
    indicator_id: i64,
) -> Result<BTreeMap<Month, Amount>> {
    let sql = format!(
        "SELECT year, month, value FROM submissions \
         WHERE indicator_id = ?1 AND {CONFIRMED_SQL} ORDER BY submission_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![indicator_id], |row| {
        Ok((competence_at(row, 0, 1)?, row.get::<_, Amount>(2)?))
    })?;
    let mut latest = BTreeMap::new();
    for row in rows {
        let (month, value) = row?;
        latest.insert(month, value);
    }
    Ok(latest)
}

fn competence_at(row: &rusqlite::Row<'_>, year_idx: usize, month_idx: usize) -> rusqlite::Result<Month> {
    let year: i32 = row.get(year_idx)?;
    let month: u32 = row.get(month_idx)?;
    Month::from_ym(year, month).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            month_idx,
            Type::Integer,
            format!("invalid competence {year}-{month}").into(),
        )
    })
}

fn row_to_submission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Submission> {
    Ok(Submission {
        id: row.get(0)?,
        indicator_id: row.get(1)?,
        competence: competence_at(row, 2, 3)?,
        value: row.get(4)?,
        confirmed: row.get(5)?,
        submitted_by: row.get(6)?,
        origin: row.get(7)?,
        evidence: row.get(8)?,
        comment: row.get(9)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::indicators::{self, tests::sample};
    use crate::db::{open_in_memory, sectors};

    pub(crate) fn ym(year: i32, month: u32) -> Month {
        Month::from_ym(year, month).expect("valid month")
    }

    pub(crate) fn seeded() -> (Connection, i64) {
        let conn = open_in_memory().expect("db");
        let sector = sectors::upsert_by_name(&conn, "Finance").expect("sector");
        let id = indicators::insert(&conn, &sample(sector)).expect("indicator");
        (conn, id)
    }

    /// Raw insert bypassing upsert rules, for seeding messy states.
    pub(crate) fn raw_insert(
        conn: &Connection,
        indicator_id: i64,
        competence: Month,
        value: Option<i64>,
        confirmed: bool,
        actor: Option<&str>,
    ) -> i64 {
        conn.execute(
            "INSERT INTO submissions (indicator_id, year, month, value, confirmed, submitted_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                indicator_id,
                competence.year(),
                competence.month(),
                value,
                confirmed,
                actor
            ],
        )
        .expect("raw insert");
        conn.last_insert_rowid()
    }

    fn write<'a>(id: i64, month: Month, actor: Option<&'a str>, value: Option<i64>) -> SubmissionWrite<'a> {
        SubmissionWrite {
            indicator_id: id,
            competence: month,
            submitted_by: actor,
            value: value.map(Amount::from_hundredths),
            origin: Some("manual"),
            evidence: None,
            comment: None,
            at: Utc::now(),
        }
    }

    #[test]
    fn upsert_updates_the_same_actor_row() {
        let (conn, id) = seeded();
        let first = upsert(&conn, &write(id, ym(2025, 2), Some("ana"), None)).expect("insert");
        let again = upsert(&conn, &write(id, ym(2025, 2), Some("ana"), Some(1250))).expect("update");
        assert_eq!(first, again);

        let row = get(&conn, first).expect("get").expect("present");
        assert!(row.confirmed);
        assert_eq!(row.value, Some(Amount::from_hundredths(1250)));

        let other = upsert(&conn, &write(id, ym(2025, 2), Some("bia"), Some(1))).expect("insert");
        assert_ne!(first, other);
    }

    #[test]
    fn upsert_without_actor_reuses_automation_row() {
        let (conn, id) = seeded();
        assert!(insert_placeholder_if_absent(&conn, id, ym(2025, 3), "auto").expect("placeholder"));
        let placeholder = find(&conn, id, ym(2025, 3), None).expect("find").expect("present");

        let written = upsert(&conn, &write(id, ym(2025, 3), None, Some(900))).expect("upsert");
        assert_eq!(written, placeholder.id);
        assert_eq!(list_for(&conn, id).expect("list").len(), 1);
    }

    #[test]
    fn placeholder_skips_competences_with_any_row() {
        let (conn, id) = seeded();
        raw_insert(&conn, id, ym(2025, 4), Some(10), true, Some("ana"));
        assert!(!insert_placeholder_if_absent(&conn, id, ym(2025, 4), "auto").expect("skip"));
        assert!(insert_placeholder_if_absent(&conn, id, ym(2025, 5), "auto").expect("insert"));
        assert!(!insert_placeholder_if_absent(&conn, id, ym(2025, 5), "auto").expect("skip"));

        let row = find(&conn, id, ym(2025, 5), None).expect("find").expect("present");
        assert!(row.is_pending());
        assert_eq!(row.value, None);
        assert_eq!(row.origin.as_deref(), Some("auto"));
    }

    #[test]
    fn pending_range_helpers_spare_confirmed_rows() {
        let (conn, id) = seeded();
        raw_insert(&conn, id, ym(2024, 12), None, false, None);
        raw_insert(&conn, id, ym(2025, 1), Some(5), true, Some("ana"));
        raw_insert(&conn, id, ym(2025, 1), None, false, None);
        raw_insert(&conn, id, ym(2025, 6), None, false, None);
        raw_insert(&conn, id, ym(2025, 7), Some(5), true, Some("ana"));

        assert_eq!(delete_pending_before(&conn, id, ym(2025, 2)).expect("before"), 2);
        assert_eq!(count_pending_from(&conn, ym(2025, 6), None).expect("count"), 1);
        assert_eq!(delete_pending_from(&conn, ym(2025, 6), Some(id)).expect("from"), 1);

        let left: Vec<_> = list_for(&conn, id)
            .expect("list")
            .into_iter()
            .map(|s| (s.competence, s.confirmed))
            .collect();
        assert_eq!(left, vec![(ym(2025, 1), true), (ym(2025, 7), true)]);
    }

    #[test]
    fn unflagged_rows_with_a_value_are_never_purged() {
        let (conn, id) = seeded();
        let legacy_early = raw_insert(&conn, id, ym(2025, 1), Some(90_000), false, None);
        raw_insert(&conn, id, ym(2025, 1), Some(0), false, None);
        let legacy_late = raw_insert(&conn, id, ym(2025, 8), Some(4_500), false, Some("ana"));
        raw_insert(&conn, id, ym(2025, 8), None, true, None);

        assert_eq!(delete_pending_before(&conn, id, ym(2025, 3)).expect("before"), 1);
        assert_eq!(count_pending_from(&conn, ym(2025, 6), Some(id)).expect("count"), 1);
        assert_eq!(delete_pending_from(&conn, ym(2025, 6), Some(id)).expect("from"), 1);

        let left: Vec<i64> = list_for(&conn, id).expect("list").into_iter().map(|s| s.id).collect();
        assert_eq!(left, vec![legacy_early, legacy_late]);
        assert_eq!(
            confirmed_competences(&conn, id, None).expect("confirmed"),
            BTreeSet::from([ym(2025, 1), ym(2025, 8)])
        );
        assert_eq!(
            latest_confirmed_values(&conn, id).expect("values").get(&ym(2025, 1)),
            Some(&Amount::from_hundredths(90_000))
        );
    }

    #[test]
    fn flag_updates_and_confirmed_lookups() {
        let (conn, id) = seeded();
        let a = raw_insert(&conn, id, ym(2025, 1), Some(0), true, Some("ana"));
        let b = raw_insert(&conn, id, ym(2025, 2), Some(40), false, Some("bia"));
        let c = raw_insert(&conn, id, ym(2025, 3), Some(70), true, Some("ana"));

        assert_eq!(set_value_null(&conn, &[a]).expect("null"), 1);
        assert_eq!(set_confirmed(&conn, &[b], true).expect("confirm"), 1);

        assert_eq!(
            confirmed_competences(&conn, id, None).expect("all"),
            BTreeSet::from([ym(2025, 2), ym(2025, 3)])
        );
        assert_eq!(
            confirmed_competences(&conn, id, Some("ana")).expect("ana"),
            BTreeSet::from([ym(2025, 3)])
        );

        let values = latest_confirmed_values(&conn, id).expect("values");
        assert_eq!(values.get(&ym(2025, 3)), Some(&Amount::from_hundredths(70)));
        assert!(!values.contains_key(&ym(2025, 1)));

        assert_eq!(delete_ids(&conn, &[a, b, c]).expect("delete"), 3);
    }
}
