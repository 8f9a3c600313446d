use chrono::NaiveDate;
use metas_core::amount::Amount;
use metas_core::clock::FixedClock;
use metas_core::db::{indicators, submissions, targets};
use metas_core::model::Periodicity;
use metas_core::reconcile::reconcile;
use metas_core::sanitize::{self, SanitizeOptions};
use metas_core::schedule::{allowed_competences, is_aligned};
use rusqlite::{Connection, params};

#[path = "generators.rs"]
mod generators;
use generators::*;

#[allow(clippy::too_many_arguments)]
fn insert_submission(
    conn: &Connection,
    id: i64,
    indicator_id: i64,
    year: i32,
    month: u32,
    value: Option<i64>,
    confirmed: bool,
    actor: Option<&str>,
) {
    conn.execute(
        "INSERT INTO submissions (submission_id, indicator_id, year, month, value, confirmed, submitted_by) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, indicator_id, year, month, value, confirmed, actor],
    )
    .expect("insert submission");
}

fn apply_options(indicator_id: i64) -> SanitizeOptions {
    SanitizeOptions {
        indicator_id: Some(indicator_id),
        dry_run: false,
        create_missing: false,
        ..SanitizeOptions::default()
    }
}

fn november_2025() -> FixedClock {
    FixedClock::on(NaiveDate::from_ymd_opt(2025, 11, 3).expect("date"))
}

#[test]
fn quarterly_indicator_allowed_set() {
    let ind = indicator(ym(2025, 1), None, Periodicity::new(3).expect("3"));
    let allowed = allowed_competences(&ind, ym(2025, 10)).expect("anchored");
    assert_eq!(
        allowed.into_iter().collect::<Vec<_>>(),
        vec![ym(2025, 1), ym(2025, 4), ym(2025, 7), ym(2025, 10)]
    );
    assert!(!is_aligned(ym(2025, 1), ind.periodicity, None, 2025, 6));
    assert!(is_aligned(ym(2025, 1), ind.periodicity, None, 2025, 7));
}

#[test]
fn end_month_with_hard_cap_deletes_later_targets() {
    let mut ind = indicator(ym(2025, 1), Some(ym(2025, 6)), Periodicity::MONTHLY);
    let mut conn = store_with(&mut ind);
    targets::insert_if_absent(&conn, ind.id, ym(2025, 9), Amount::ZERO).expect("seed");

    let report = reconcile(&mut conn, &ind, ym(2025, 12), true).expect("reconcile");
    assert_eq!(report.created, 6);
    assert_eq!(report.removed, 1);

    let months: Vec<_> = targets::list_for(&conn, ind.id)
        .expect("targets")
        .into_iter()
        .map(|t| t.month)
        .collect();
    assert_eq!(months, (1..=6).map(|m| ym(2025, m)).collect::<Vec<_>>());
}

#[test]
fn stored_zero_periodicity_behaves_as_monthly() {
    let mut ind = indicator(ym(2025, 1), None, Periodicity::MONTHLY);
    let conn = store_with(&mut ind);
    conn.execute(
        "UPDATE indicators SET periodicity = 0 WHERE indicator_id = ?1",
        params![ind.id],
    )
    .expect("legacy periodicity");

    let loaded = indicators::get(&conn, ind.id).expect("get").expect("present");
    assert_eq!(loaded.periodicity, Periodicity::MONTHLY);
    assert_eq!(allowed_competences(&loaded, ym(2025, 3)).expect("anchored").len(), 3);
    assert!(Periodicity::new(0).is_err());
}

#[test]
fn sanitizer_keeps_lowest_of_duplicate_pending_rows() {
    let mut ind = indicator(ym(2025, 1), None, Periodicity::MONTHLY);
    let mut conn = store_with(&mut ind);
    for id in [9, 5, 12] {
        insert_submission(&conn, id, ind.id, 2025, 3, None, false, None);
    }

    let report = sanitize::run(&mut conn, &november_2025(), &apply_options(ind.id)).expect("run");
    assert_eq!(report.totals.dedup, 2);

    let left: Vec<i64> = submissions::list_for(&conn, ind.id)
        .expect("list")
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(left, vec![5]);
}

#[test]
fn confirmed_row_supersedes_pending_even_when_misaligned() {
    let mut ind = indicator(ym(2025, 1), None, Periodicity::new(3).expect("3"));
    let mut conn = store_with(&mut ind);
    // 2025-02 is not an allowed competence for a quarterly schedule.
    insert_submission(&conn, 1, ind.id, 2025, 2, Some(4_200), true, Some("ana"));
    insert_submission(&conn, 2, ind.id, 2025, 2, None, false, None);
    insert_submission(&conn, 3, ind.id, 2025, 2, Some(0), false, Some("bia"));

    let report = sanitize::run(&mut conn, &november_2025(), &apply_options(ind.id)).expect("run");
    assert_eq!(report.totals.deleted, 2);
    assert_eq!(report.totals.dedup, 0);

    let left = submissions::list_for(&conn, ind.id).expect("list");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, 1);
    assert_eq!(left[0].value, Some(Amount::from_hundredths(4_200)));
}

#[test]
fn sanitizer_fills_gaps_and_stops_before_the_current_month() {
    let mut ind = indicator(ym(2025, 7), None, Periodicity::MONTHLY);
    let mut conn = store_with(&mut ind);

    let options = SanitizeOptions {
        dry_run: false,
        placeholder_origin: "nightly".into(),
        ..SanitizeOptions::default()
    };
    let report = sanitize::run(&mut conn, &november_2025(), &options).expect("run");
    assert_eq!(report.totals.created, 4);

    let rows = submissions::list_for(&conn, ind.id).expect("list");
    assert_eq!(
        rows.iter().map(|s| s.competence).collect::<Vec<_>>(),
        vec![ym(2025, 7), ym(2025, 8), ym(2025, 9), ym(2025, 10)]
    );
    assert!(rows.iter().all(|s| s.is_pending() && s.value.is_none()));
    assert!(rows.iter().all(|s| s.origin.as_deref() == Some("nightly")));
}
