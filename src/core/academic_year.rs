//! Academic year arithmetic.
//!
//! An academic year is identified by the calendar year it starts in and
//! begins on the first day of the configured start month, so with a June
//! start `2025` covers 1 June 2025 up to 31 May 2026.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An academic year, identified by its starting calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AcademicYear(i32);

impl AcademicYear {
    /// Creates the academic year starting in `start_year`.
    #[must_use]
    pub const fn new(start_year: i32) -> Self {
        Self(start_year)
    }

    /// Calendar year in which this academic year starts.
    #[must_use]
    pub const fn start_year(self) -> i32 {
        self.0
    }

    /// The academic year that `date` falls in.
    ///
    /// `start_month` is clamped to `1..=12`.
    #[must_use]
    pub fn containing(date: NaiveDate, start_month: u32) -> Self {
        let start_month = start_month.clamp(1, 12);
        if date.month() >= start_month {
            Self(date.year())
        } else {
            Self(date.year() - 1)
        }
    }

    /// The academic year containing today's date (UTC).
    #[must_use]
    pub fn current(start_month: u32) -> Self {
        Self::containing(Utc::now().date_naive(), start_month)
    }

    /// The academic year immediately before this one.
    #[must_use]
    pub const fn previous(self) -> Self {
        Self(self.0 - 1)
    }

    /// The academic year immediately after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.0, (self.0 + 1).rem_euclid(100))
    }
}

impl From<i32> for AcademicYear {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_containing_before_and_after_start_month() {
        let may = NaiveDate::from_ymd_opt(2026, 5, 31).unwrap();
        let june = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();

        assert_eq!(AcademicYear::containing(may, 6), AcademicYear::new(2025));
        assert_eq!(AcademicYear::containing(june, 6), AcademicYear::new(2026));
    }

    #[test]
    fn test_january_start_matches_calendar_year() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(AcademicYear::containing(date, 1), AcademicYear::new(2025));
        // Out-of-range months behave like January
        assert_eq!(AcademicYear::containing(date, 0), AcademicYear::new(2025));
    }

    #[test]
    fn test_display_label() {
        assert_eq!(AcademicYear::new(2025).to_string(), "2025-26");
        assert_eq!(AcademicYear::new(2099).to_string(), "2099-00");
    }

    #[test]
    fn test_previous_and_next() {
        let year = AcademicYear::new(2025);
        assert_eq!(year.previous(), AcademicYear::new(2024));
        assert_eq!(year.next(), AcademicYear::new(2026));
        assert!(year.previous() < year);
    }
}
