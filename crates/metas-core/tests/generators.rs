#![allow(dead_code)]

use chrono::NaiveDate;
use metas_core::amount::Amount;
use metas_core::calendar::Month;
use metas_core::db::{indicators, open_in_memory, sectors};
use metas_core::model::{Indicator, Periodicity, TargetDirection, ValueKind};
use proptest::prelude::*;
use rusqlite::Connection;

pub fn ym(year: i32, month: u32) -> Month {
    Month::from_ym(year, month).expect("valid month")
}

pub fn arb_month() -> impl Strategy<Value = Month> {
    (2000i32..2040, 1u32..=12).prop_map(|(y, m)| ym(y, m))
}

pub fn arb_periodicity() -> impl Strategy<Value = Periodicity> {
    (1i64..=12).prop_map(|p| Periodicity::new(p).expect("in range"))
}

/// Month offsets relative to some base, for seeding existing rows.
pub fn arb_offsets(max: i32) -> impl Strategy<Value = Vec<i32>> {
    proptest::collection::vec(0..max, 0..12)
}

pub fn indicator(start: Month, end: Option<Month>, periodicity: Periodicity) -> Indicator {
    Indicator {
        id: 0,
        name: "Throughput".into(),
        sector_id: 0,
        direction: TargetDirection::Increasing,
        target_value: Amount::from_hundredths(1_000),
        value_kind: ValueKind::Numeric,
        start_month: Some(start),
        end_month: end,
        periodicity,
        active: true,
        visible: true,
        instructions: String::new(),
        created_on: NaiveDate::from_ymd_opt(2000, 1, 1),
    }
}

/// Fresh in-memory store holding `indicator`, whose ids are filled in.
pub fn store_with(indicator: &mut Indicator) -> Connection {
    let conn = open_in_memory().expect("db");
    indicator.sector_id = sectors::upsert_by_name(&conn, "Ops").expect("sector");
    indicator.id = indicators::insert(&conn, indicator).expect("indicator");
    conn
}
