use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Inclusive calendar date range `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range, returning None when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, counting both ends.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// True when the two ranges overlap or are separated by at most one day.
    pub fn touches(&self, other: &DateRange) -> bool {
        self.start <= other.end + Duration::days(1) && other.start <= self.end + Duration::days(1)
    }

    /// Restricts the range to `bounds`, or None when they do not intersect.
    pub fn clamp_to(&self, bounds: &DateRange) -> Option<DateRange> {
        DateRange::new(self.start.max(bounds.start), self.end.min(bounds.end))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
