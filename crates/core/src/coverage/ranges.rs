use chrono::Duration;

use super::report::CoverageReport;
use pricesync_market_data::DateRange;

/// Candidate fetch ranges for one symbol, before merging.
///
/// - recent refresh: `max(from, last - window)..to` when the newest row is
///   more than one day behind `to`
/// - gap fill: from the first missing weekday to the end of the stored span,
///   or only up to the oldest row when the sole hole precedes it
/// - initial load: the whole request when nothing is stored
pub fn plan_ranges(
    report: &CoverageReport,
    request: DateRange,
    refetch_window_days: i64,
) -> Vec<DateRange> {
    let (Some(first), Some(last)) = (report.first_date, report.last_date) else {
        return vec![request];
    };

    let mut ranges = Vec::with_capacity(2);

    if (request.end - last).num_days() > 1 {
        let start = request
            .start
            .max(last - Duration::days(refetch_window_days.max(0)));
        ranges.extend(DateRange::new(start, request.end));
    }

    if report.has_weekday_gaps {
        if let Some(missing) = report.first_missing_weekday {
            let end = if missing < first && !report.has_interior_gaps {
                first
            } else {
                last
            };
            ranges.extend(DateRange::new(request.start.max(missing), end));
        }
    }

    ranges
}

/// Merge overlapping or adjacent ranges into an ascending, disjoint set
/// clamped to `bounds`.
pub fn merge_ranges(ranges: Vec<DateRange>, bounds: DateRange) -> Vec<DateRange> {
    let mut clamped: Vec<DateRange> = ranges
        .iter()
        .filter_map(|range| range.clamp_to(&bounds))
        .collect();
    clamped.sort();

    let mut merged: Vec<DateRange> = Vec::with_capacity(clamped.len());
    for range in clamped {
        match merged.last_mut() {
            Some(current) if current.touches(&range) => {
                current.end = current.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}
