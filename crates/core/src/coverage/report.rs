use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::prices::PriceStore;
use pricesync_market_data::DateRange;

/// Coverage of one symbol inside a requested range. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub row_count: i64,
    pub has_weekday_gaps: bool,
    /// Earliest missing weekday, which precedes `first_date` when the
    /// request starts before the oldest stored row
    pub first_missing_weekday: Option<NaiveDate>,
    /// A weekday is missing between `first_date` and `last_date`
    pub has_interior_gaps: bool,
}

impl CoverageReport {
    pub fn is_empty(&self) -> bool {
        self.row_count == 0 || self.first_date.is_none()
    }

    /// Build the report for the rows stored inside `range`.
    ///
    /// Weekdays between `range.start` and the oldest stored row are a leading
    /// hole. The expected weekday count of the stored span is computed
    /// arithmetically, and stored dates are only loaded when the row count
    /// falls short of it.
    pub fn compute(store: &dyn PriceStore, symbol: &str, range: DateRange) -> Result<Self> {
        let Some(bounds) = store.coverage_bounds(symbol, range)? else {
            return Ok(Self::default());
        };

        let leading = bounds
            .first_date
            .pred_opt()
            .filter(|before| count_weekdays(range.start, *before) > 0)
            .and_then(|_| first_weekday_from(range.start));

        let expected = count_weekdays(bounds.first_date, bounds.last_date);
        let interior = if bounds.row_count < expected {
            let stored = DateRange {
                start: bounds.first_date,
                end: bounds.last_date,
            };
            let dates = store.stored_dates(symbol, stored)?;
            find_first_missing_weekday(&dates, bounds.first_date, bounds.last_date)
        } else {
            None
        };

        let first_missing_weekday = leading.or(interior);
        Ok(Self {
            first_date: Some(bounds.first_date),
            last_date: Some(bounds.last_date),
            row_count: bounds.row_count,
            has_weekday_gaps: first_missing_weekday.is_some(),
            first_missing_weekday,
            has_interior_gaps: interior.is_some(),
        })
    }
}

fn first_weekday_from(day: NaiveDate) -> Option<NaiveDate> {
    day.iter_days().take(7).find(|d| is_weekday(*d))
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Number of Monday to Friday dates in `[start, end]`. No holiday calendar.
pub fn count_weekdays(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return 0;
    }
    let days = (end - start).num_days() + 1;
    let full_weeks = days / 7;
    let remainder = (0..days % 7)
        .filter(|offset| is_weekday(start + Duration::days(*offset)))
        .count() as i64;
    full_weeks * 5 + remainder
}

/// Earliest weekday in `[start, end]` absent from `dates` (sorted ascending).
pub fn find_first_missing_weekday(
    dates: &[NaiveDate],
    start: NaiveDate,
    end: NaiveDate,
) -> Option<NaiveDate> {
    let mut stored = dates.iter().copied().filter(|d| *d >= start).peekable();
    let mut day = start;

    while day <= end {
        while stored.peek().is_some_and(|d| *d < day) {
            stored.next();
        }
        if is_weekday(day) && stored.peek() != Some(&day) {
            return Some(day);
        }
        day = day.succ_opt()?;
    }
    None
}
