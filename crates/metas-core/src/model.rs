//! Domain records: indicators, sectors, monthly targets, submissions.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::amount::Amount;
use crate::calendar::Month;
use crate::error::{MetasError, Result};

/// Interval, in months, between required competences.
///
/// Always holds a value in 1..=12. [`Periodicity::new`] rejects anything
/// else and is used where indicators are written; [`Periodicity::clamped`]
/// folds legacy stored values into range and is used where they are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Periodicity(u8);

impl Periodicity {
    pub const MONTHLY: Self = Self(1);
    pub const MAX_MONTHS: u8 = 12;

    /// # Errors
    ///
    /// Returns [`MetasError::InvalidPeriodicity`] outside 1..=12.
    pub fn new(months: i64) -> Result<Self> {
        u8::try_from(months)
            .ok()
            .filter(|m| (1..=Self::MAX_MONTHS).contains(m))
            .map(Self)
            .ok_or(MetasError::InvalidPeriodicity(months))
    }

    /// Clamp any integer into 1..=12.
    #[must_use]
    pub fn clamped(months: i64) -> Self {
        let months = months.clamp(1, i64::from(Self::MAX_MONTHS));
        Self(u8::try_from(months).unwrap_or(1))
    }

    #[must_use]
    pub const fn months(self) -> u8 {
        self.0
    }
}

impl Default for Periodicity {
    fn default() -> Self {
        Self::MONTHLY
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which way a realized value should move relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetDirection {
    Increasing,
    Decreasing,
    Monitoring,
}

impl TargetDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Monitoring => "monitoring",
        }
    }
}

impl fmt::Display for TargetDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetDirection {
    type Err = MetasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "increasing" | "up" | "crescente" => Ok(Self::Increasing),
            "decreasing" | "down" | "decrescente" => Ok(Self::Decreasing),
            "monitoring" | "monitor" | "monitoramento" => Ok(Self::Monitoring),
            other => Err(MetasError::InvalidEnumValue {
                field: "direction",
                value: other.to_string(),
            }),
        }
    }
}

/// How a value is displayed and interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    Numeric,
    Monetary,
    Percentage,
}

impl ValueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Monetary => "monetary",
            Self::Percentage => "percentage",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = MetasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numeric" | "number" | "numeral" => Ok(Self::Numeric),
            "monetary" | "money" | "monetario" => Ok(Self::Monetary),
            "percentage" | "percent" | "percentual" => Ok(Self::Percentage),
            other => Err(MetasError::InvalidEnumValue {
                field: "value kind",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sector {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

/// A tracked KPI with a target cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Indicator {
    pub id: i64,
    pub name: String,
    pub sector_id: i64,
    pub direction: TargetDirection,
    pub target_value: Amount,
    pub value_kind: ValueKind,
    pub start_month: Option<Month>,
    pub end_month: Option<Month>,
    pub periodicity: Periodicity,
    pub active: bool,
    pub visible: bool,
    pub instructions: String,
    pub created_on: Option<NaiveDate>,
}

impl Indicator {
    /// Check the start/end invariant.
    ///
    /// # Errors
    ///
    /// Returns [`MetasError::EndBeforeStart`] when both months are set and
    /// the end precedes the start.
    pub fn validate_range(&self) -> Result<()> {
        validate_range(self.start_month, self.end_month)
    }
}

pub(crate) fn validate_range(start: Option<Month>, end: Option<Month>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(MetasError::EndBeforeStart { start, end }),
        _ => Ok(()),
    }
}

/// A target row for one indicator and competence month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyTarget {
    pub id: i64,
    pub indicator_id: i64,
    pub month: Month,
    pub target_value: Amount,
}

/// An actual-value row. `value == None` means pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub id: i64,
    pub indicator_id: i64,
    pub competence: Month,
    pub value: Option<Amount>,
    pub confirmed: bool,
    pub submitted_by: Option<String>,
    pub origin: Option<String>,
    pub evidence: Option<String>,
    pub comment: Option<String>,
}

impl Submission {
    /// A row counts as confirmed when it holds a value and is either flagged
    /// confirmed or the value is non-zero. Legacy rows may carry a real value
    /// with the flag unset; they are confirmed all the same.
    ///
    /// Must agree with [`crate::db::submissions::CONFIRMED_SQL`].
    #[must_use]
    pub const fn is_effectively_confirmed(&self) -> bool {
        match self.value {
            None => false,
            Some(value) => self.confirmed || !value.is_zero(),
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.is_effectively_confirmed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodicity_new_is_strict() {
        assert_eq!(Periodicity::new(1).expect("1").months(), 1);
        assert_eq!(Periodicity::new(12).expect("12").months(), 12);
        for bad in [0, -1, 13, 300] {
            assert!(matches!(
                Periodicity::new(bad),
                Err(MetasError::InvalidPeriodicity(v)) if v == bad
            ));
        }
    }

    #[test]
    fn periodicity_clamped_folds_into_range() {
        assert_eq!(Periodicity::clamped(0).months(), 1);
        assert_eq!(Periodicity::clamped(-4).months(), 1);
        assert_eq!(Periodicity::clamped(15).months(), 12);
        assert_eq!(Periodicity::clamped(3).months(), 3);
    }

    #[test]
    fn direction_accepts_legacy_aliases() {
        assert_eq!("crescente".parse::<TargetDirection>().expect("alias"), TargetDirection::Increasing);
        assert_eq!(" DOWN ".parse::<TargetDirection>().expect("alias"), TargetDirection::Decreasing);
        assert_eq!("monitoring".parse::<TargetDirection>().expect("canonical"), TargetDirection::Monitoring);
        assert!("sideways".parse::<TargetDirection>().is_err());
    }

    #[test]
    fn value_kind_round_trips_through_str() {
        for kind in [ValueKind::Numeric, ValueKind::Monetary, ValueKind::Percentage] {
            assert_eq!(kind.as_str().parse::<ValueKind>().expect("round trip"), kind);
        }
        assert_eq!("percentual".parse::<ValueKind>().expect("alias"), ValueKind::Percentage);
    }

    fn submission(value: Option<i64>, confirmed: bool) -> Submission {
        Submission {
            id: 1,
            indicator_id: 1,
            competence: Month::from_ym(2025, 1).expect("month"),
            value: value.map(Amount::from_hundredths),
            confirmed,
            submitted_by: None,
            origin: None,
            evidence: None,
            comment: None,
        }
    }

    #[test]
    fn confirmation_follows_the_value() {
        assert!(submission(Some(90_000), false).is_effectively_confirmed());
        assert!(submission(Some(0), true).is_effectively_confirmed());
        assert!(submission(Some(5), true).is_effectively_confirmed());
        assert!(submission(Some(0), false).is_pending());
        assert!(submission(None, true).is_pending());
        assert!(submission(None, false).is_pending());
    }

    #[test]
    fn range_validation() {
        let jan = Month::from_ym(2025, 1);
        let jun = Month::from_ym(2025, 6);
        assert!(validate_range(jan, jun).is_ok());
        assert!(validate_range(jan, jan).is_ok());
        assert!(validate_range(None, jun).is_ok());
        assert!(matches!(
            validate_range(jun, jan),
            Err(MetasError::EndBeforeStart { .. })
        ));
    }
}
