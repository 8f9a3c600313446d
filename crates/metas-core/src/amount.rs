//! Fixed-point amounts with two fraction digits.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Serialize, Serializer};

use crate::error::MetasError;

/// A decimal value stored as integer hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    #[must_use]
    pub const fn hundredths(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn abs_diff(self, other: Self) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// Lossy conversion for percentage math and display.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Amount {
    type Err = MetasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_amount(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Amount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Self)
    }
}

/// Parse a user-entered number such as `100`, `100,5`, `1.234,56` or
/// `1,234.56`.
///
/// The last `,` or `.` is the decimal separator; every other separator is a
/// thousands mark and is dropped. Fractions beyond two digits are rounded
/// half away from zero.
///
/// # Errors
///
/// Returns [`MetasError::InvalidAmount`] when no digits are present, when a
/// character other than digits, separators, spaces or a leading `-` appears,
/// or when the value overflows.
pub fn parse_amount(raw: &str) -> Result<Amount, MetasError> {
    let invalid = || MetasError::InvalidAmount(raw.to_string());

    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let (negative, body) = compact
        .strip_prefix('-')
        .map_or((false, compact.as_str()), |rest| (true, rest));

    if body.is_empty()
        || !body
            .chars()
            .all(|c| c.is_ascii_digit() || c == ',' || c == '.')
    {
        return Err(invalid());
    }

    let (int_part, frac_part) = match body.rfind([',', '.']) {
        Some(pos) => (&body[..pos], &body[pos + 1..]),
        None => (body, ""),
    };

    let int_digits: String = int_part.chars().filter(char::is_ascii_digit).collect();
    if int_digits.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }

    let whole: i64 = if int_digits.is_empty() {
        0
    } else {
        int_digits.parse().map_err(|_| invalid())?
    };

    let mut frac = frac_part.chars().filter_map(|c| c.to_digit(10));
    let tenths = i64::from(frac.next().unwrap_or(0));
    let hundredths = i64::from(frac.next().unwrap_or(0));
    let round_up = frac.next().is_some_and(|d| d >= 5);

    let cents = whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
        .ok_or_else(invalid)?;

    Ok(Amount(if negative { -cents } else { cents }))
}
