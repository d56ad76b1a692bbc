use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

use crate::constants::RECENT_SAMPLE_WINDOW_DAYS;

/// `count` indices spread evenly over `[first, last]`, both ends included.
fn spread(first: usize, last: usize, count: usize) -> impl Iterator<Item = usize> {
    let width = last - first;
    (0..count).map(move |i| {
        if count == 1 {
            last
        } else {
            // round(i * width / (count - 1))
            first + (2 * i * width + (count - 1)) / (2 * (count - 1))
        }
    })
}

/// Indices into `dates` (sorted ascending) to compare against the source.
///
/// Up to `points` evenly spaced indices always including the oldest and
/// newest row, plus about `points / 2` more drawn from the last 90 days.
/// The result is ascending and free of duplicates.
pub fn sample_indices(dates: &[NaiveDate], points: usize) -> Vec<usize> {
    let Some(newest) = dates.last() else {
        return Vec::new();
    };
    let last = dates.len() - 1;
    let count = points.max(2).min(dates.len());

    let mut indices: BTreeSet<usize> = spread(0, last, count).collect();

    let recent_cutoff = *newest - Duration::days(RECENT_SAMPLE_WINDOW_DAYS);
    let recent_start = dates.partition_point(|d| *d < recent_cutoff);
    let extra = (count / 2).min(last - recent_start + 1);
    indices.extend(spread(recent_start, last, extra));

    indices.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily(start: NaiveDate, len: usize) -> Vec<NaiveDate> {
        (0..len as i64).map(|i| start + Duration::days(i)).collect()
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
    }

    #[test]
    fn test_includes_oldest_and_newest() {
        let dates = daily(start(), 1000);
        let indices = sample_indices(&dates, 10);
        assert_eq!(indices.first(), Some(&0));
        assert_eq!(indices.last(), Some(&999));
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_recent_window_gets_extra_samples() {
        let dates = daily(start(), 1000);
        let indices = sample_indices(&dates, 10);
        let recent_cutoff = dates[999] - Duration::days(RECENT_SAMPLE_WINDOW_DAYS);
        let recent = indices.iter().filter(|i| dates[**i] >= recent_cutoff).count();
        // One evenly spaced point lands there on its own, the extras add more
        assert!(recent >= 5, "only {} recent samples", recent);
        assert!(indices.len() <= 15);
    }

    #[test]
    fn test_short_series() {
        let dates = daily(start(), 2);
        assert_eq!(sample_indices(&dates, 10), vec![0, 1]);
        assert!(sample_indices(&[], 10).is_empty());
        assert_eq!(sample_indices(&daily(start(), 1), 10), vec![0]);
    }

    #[test]
    fn test_spread_is_even() {
        let spaced: Vec<usize> = spread(0, 9, 4).collect();
        assert_eq!(spaced, vec![0, 3, 6, 9]);
    }
}
