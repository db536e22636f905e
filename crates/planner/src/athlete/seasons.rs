//! Splitting an athlete's training history into seasons.

use std::ops::Range;

use time::Date;
use tracing::debug;

/// Longest span, in days, a season may have.
pub const SEASON_LIMIT_DAYS: i64 = 2 * 365;

fn span(dates: &[Date], season: &Range<usize>) -> i64 {
    (dates[season.end - 1] - dates[season.start]).whole_days()
}

/// Splits after the largest gap; the earliest gap wins ties.
fn split(dates: &[Date], season: Range<usize>) -> (Range<usize>, Range<usize>) {
    let mut at = season.start + 1;
    let mut largest = i64::MIN;
    for i in season.start + 1..season.end {
        let gap = (dates[i] - dates[i - 1]).whole_days();
        if gap > largest {
            largest = gap;
            at = i;
        }
    }
    debug!(
        "Splitting {} - {} at {}",
        dates[season.start],
        dates[season.end - 1],
        dates[at]
    );
    (season.start..at, at..season.end)
}

/// Groups ascending, active `dates` into seasons no longer than `limit_days`.
///
/// Starting from one season covering everything, the longest season is
/// repeatedly split at its largest gap until every season fits. Seasons come
/// back as `(first, last)` day pairs ordered by start.
pub fn find_seasons(dates: &[Date], limit_days: i64) -> Vec<(Date, Date)> {
    if dates.is_empty() {
        return Vec::new();
    }
    debug_assert!(dates.is_sorted(), "active days must be sorted");
    // A single day spans zero days, so a negative limit could never be met.
    let limit_days = limit_days.max(0);

    let mut seasons = vec![0..dates.len()];
    let mut iteration = 0;
    loop {
        let sizes: Vec<i64> = seasons.iter().map(|s| span(dates, s)).collect();
        let biggest = sizes.iter().copied().max().unwrap_or(0);
        if biggest <= limit_days {
            break;
        }
        iteration += 1;
        debug!("Season split iteration {iteration}");

        let idx = sizes.iter().position(|s| *s == biggest).unwrap_or(0);
        let season = seasons.remove(idx);
        let (left, right) = split(dates, season);
        seasons.push(left);
        seasons.push(right);
    }

    let mut rtn: Vec<(Date, Date)> = seasons
        .iter()
        .map(|s| (dates[s.start], dates[s.end - 1]))
        .collect();
    rtn.sort_by_key(|(start, _)| *start);
    rtn
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::date};

    use super::*;

    fn days(offsets: &[i64]) -> Vec<Date> {
        let origin = date!(2020 - 01 - 01);
        offsets.iter().map(|d| origin + Duration::days(*d)).collect()
    }

    fn offsets(seasons: &[(Date, Date)]) -> Vec<(i64, i64)> {
        let origin = date!(2020 - 01 - 01);
        seasons
            .iter()
            .map(|(s, e)| ((*s - origin).whole_days(), (*e - origin).whole_days()))
            .collect()
    }

    #[test]
    fn test_splits_once_at_largest_gap() {
        let seasons = find_seasons(&days(&[0, 1, 40, 41]), 10);
        assert_eq!(offsets(&seasons), vec![(0, 1), (40, 41)]);
    }

    #[test]
    fn test_short_history_is_one_season() {
        let seasons = find_seasons(&days(&[0, 100, 700]), SEASON_LIMIT_DAYS);
        assert_eq!(offsets(&seasons), vec![(0, 700)]);
    }

    #[test]
    fn test_earliest_equal_gap_wins() {
        let seasons = find_seasons(&days(&[0, 10, 20]), 15);
        assert_eq!(offsets(&seasons), vec![(0, 0), (10, 20)]);
    }

    #[test]
    fn test_repeats_until_every_season_fits() {
        let seasons = find_seasons(&days(&[0, 5, 30, 32, 60, 61, 100]), 10);
        assert_eq!(
            offsets(&seasons),
            vec![(0, 5), (30, 32), (60, 61), (100, 100)]
        );
        assert!(find_seasons(&[], 10).is_empty());
    }

    #[test]
    fn test_negative_limit_splits_into_single_days() {
        assert_eq!(offsets(&find_seasons(&days(&[3]), -1)), vec![(3, 3)]);
        assert_eq!(
            offsets(&find_seasons(&days(&[0, 1, 9]), -30)),
            vec![(0, 0), (1, 1), (9, 9)]
        );
    }
}
