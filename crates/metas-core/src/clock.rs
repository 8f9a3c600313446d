//! "Now" providers. The engine never reads ambient time directly.

use chrono::{DateTime, NaiveDate, Utc};

use crate::calendar::Month;

/// Environment override for the system clock's date, `YYYY-MM-DD`.
pub const TODAY_ENV: &str = "METAS_TODAY";

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// The month containing today.
    fn current_month(&self) -> Month {
        Month::from_date(self.today())
    }

    /// The most recent month that has fully elapsed.
    fn last_elapsed_month(&self) -> Month {
        self.current_month().pred()
    }
}

/// Wall clock, optionally pinned through [`TODAY_ENV`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    pinned: Option<NaiveDate>,
}

impl SystemClock {
    /// Read the [`TODAY_ENV`] override. Unparsable values are ignored with
    /// a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let pinned = std::env::var(TODAY_ENV).ok().and_then(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|err| {
                    tracing::warn!(value = %raw, error = %err, "ignoring unparsable {TODAY_ENV}");
                })
                .ok()
        });
        Self { pinned }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.pinned {
            Some(date) => date.and_time(now.time()).and_utc(),
            None => now,
        }
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    at: DateTime<Utc>,
}

impl FixedClock {
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }

    /// Midnight UTC on `date`.
    #[must_use]
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_derives_months() {
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 11, 14).expect("date"));
        assert_eq!(clock.current_month().to_string(), "2025-11");
        assert_eq!(clock.last_elapsed_month().to_string(), "2025-10");
    }

    #[test]
    fn last_elapsed_month_in_january_is_previous_december() {
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2026, 1, 1).expect("date"));
        assert_eq!(clock.last_elapsed_month().to_string(), "2025-12");
    }
}
