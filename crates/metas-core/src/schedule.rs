//! Which competences an indicator requires.
//!
//! An indicator's schedule starts at its anchor (start month, or the month
//! it was created when no start is set), repeats every `periodicity` months,
//! and stops at the optional end month.

use std::collections::BTreeSet;

use crate::calendar::Month;
use crate::error::{MetasError, Result};
use crate::model::{Indicator, Periodicity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub anchor: Month,
    pub periodicity: Periodicity,
    pub end: Option<Month>,
}

impl Schedule {
    /// # Errors
    ///
    /// Returns [`MetasError::InvalidConfiguration`] when the indicator has no
    /// start month and no creation date.
    pub fn for_indicator(indicator: &Indicator) -> Result<Self> {
        Ok(Self {
            anchor: resolve_anchor(indicator)?,
            periodicity: indicator.periodicity,
            end: indicator.end_month,
        })
    }

    #[must_use]
    pub fn is_aligned(&self, candidate: Month) -> bool {
        if candidate < self.anchor {
            return false;
        }
        if self.end.is_some_and(|end| candidate > end) {
            return false;
        }
        let steps = candidate.months_since(self.anchor);
        steps % i32::from(self.periodicity.months()) == 0
    }

    /// `min(horizon, end)`.
    #[must_use]
    pub fn ceiling(&self, horizon: Month) -> Month {
        self.end.map_or(horizon, |end| end.min(horizon))
    }

    /// Every aligned month from the anchor through `min(horizon, end)`.
    #[must_use]
    pub fn allowed_until(&self, horizon: Month) -> BTreeSet<Month> {
        let ceiling = self.ceiling(horizon);
        let step = i32::from(self.periodicity.months());

        let mut allowed = BTreeSet::new();
        let mut cursor = self.anchor;
        while cursor <= ceiling {
            allowed.insert(cursor);
            let next = cursor.step(step);
            if next == cursor {
                break;
            }
            cursor = next;
        }
        allowed
    }
}

/// The month periodicity is measured from.
///
/// # Errors
///
/// Returns [`MetasError::InvalidConfiguration`] when neither a start month
/// nor a creation date is available.
pub fn resolve_anchor(indicator: &Indicator) -> Result<Month> {
    indicator
        .start_month
        .or_else(|| indicator.created_on.map(Month::from_date))
        .ok_or(MetasError::InvalidConfiguration {
            indicator_id: indicator.id,
        })
}

/// Whether `(year, month)` is a required competence for a schedule anchored
/// at `anchor`. Invalid month numbers are never aligned.
#[must_use]
pub fn is_aligned(
    anchor: Month,
    periodicity: Periodicity,
    end: Option<Month>,
    year: i32,
    month: u32,
) -> bool {
    Month::from_ym(year, month).is_some_and(|candidate| {
        Schedule {
            anchor,
            periodicity,
            end,
        }
        .is_aligned(candidate)
    })
}

/// Allowed competences of `indicator` up to `horizon`.
///
/// # Errors
///
/// Returns [`MetasError::InvalidConfiguration`] when no anchor resolves.
pub fn allowed_competences(indicator: &Indicator, horizon: Month) -> Result<BTreeSet<Month>> {
    Ok(Schedule::for_indicator(indicator)?.allowed_until(horizon))
}
