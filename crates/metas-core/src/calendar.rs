//! Month arithmetic for competences.
//!
//! A [`Month`] is the single normalized representation of a competence used
//! throughout the engine. Target rows store it as a day-1 date, submission
//! rows store it decomposed as `(year, month)`; both convert through
//! [`Month::first_day`] / [`Month::from_ym`] at the store boundary.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Serialize, Serializer};

use crate::error::MetasError;

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// A calendar month, always anchored at day 1.
///
/// Internally a count of months since year 0, clamped to years 1..=9999 so
/// that stepping is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    index: i32,
}

impl Month {
    pub const MIN: Self = Self {
        index: MIN_YEAR * 12,
    };
    pub const MAX: Self = Self {
        index: MAX_YEAR * 12 + 11,
    };

    /// Build a month from a decomposed `(year, month)` competence.
    ///
    /// Returns `None` when `month` is outside 1..=12 or the year is outside
    /// the supported range.
    #[must_use]
    pub fn from_ym(year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return None;
        }
        let month = i32::try_from(month).ok()?;
        Some(Self {
            index: year * 12 + (month - 1),
        })
    }

    /// The month containing `date`.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        let year = date.year().clamp(MIN_YEAR, MAX_YEAR);
        Self::from_ym(year, date.month()).unwrap_or(Self::MIN)
    }

    #[must_use]
    pub const fn year(self) -> i32 {
        self.index.div_euclid(12)
    }

    /// Month number, 1..=12.
    #[must_use]
    pub const fn month(self) -> u32 {
        self.index.rem_euclid(12).unsigned_abs() + 1
    }

    /// Day 1 of this month.
    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        // Years are clamped to 1..=9999, which chrono always represents.
        NaiveDate::from_ymd_opt(self.year(), self.month(), 1).unwrap_or(NaiveDate::MIN)
    }

    /// Signed number of months from `earlier` to `self`.
    #[must_use]
    pub const fn months_since(self, earlier: Self) -> i32 {
        self.index - earlier.index
    }

    /// Advance by `n` months (negative steps go back), saturating at the
    /// supported range.
    #[must_use]
    pub fn step(self, n: i32) -> Self {
        let index = self
            .index
            .saturating_add(n)
            .clamp(Self::MIN.index, Self::MAX.index);
        Self { index }
    }

    #[must_use]
    pub fn pred(self) -> Self {
        self.step(-1)
    }

    #[must_use]
    pub fn succ(self) -> Self {
        self.step(1)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for Month {
    type Err = MetasError;

    /// Accepts `YYYY-MM` and `YYYY-MM-DD`; the day is discarded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let malformed = || MetasError::MalformedCompetence(s.to_string());

        match raw.len() {
            7 => {
                let (year, month) = raw.split_once('-').ok_or_else(malformed)?;
                if year.len() != 4 || month.len() != 2 {
                    return Err(malformed());
                }
                let year: i32 = year.parse().map_err(|_| malformed())?;
                let month: u32 = month.parse().map_err(|_| malformed())?;
                Self::from_ym(year, month).ok_or_else(malformed)
            }
            10 => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Self::from_date)
                .map_err(|_| malformed()),
            _ => Err(malformed()),
        }
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl ToSql for Month {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.first_day().format("%Y-%m-%d").to_string()))
    }
}

impl FromSql for Month {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse::<Self>()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

/// First day of the month containing `date`.
#[must_use]
pub fn truncate_to_month(date: NaiveDate) -> NaiveDate {
    Month::from_date(date).first_day()
}

/// Signed count of calendar months from `b` to `a`, on truncated inputs.
#[must_use]
pub fn months_between(a: NaiveDate, b: NaiveDate) -> i32 {
    Month::from_date(a).months_since(Month::from_date(b))
}

/// `date` advanced by `n` calendar months, landing on day 1.
#[must_use]
pub fn step_months(date: NaiveDate, n: i32) -> NaiveDate {
    Month::from_date(date).step(n).first_day()
}
