//! Opening-time habits: weekday, hour and month histograms plus gap statistics.

use super::stats::{mean, median};
use crate::models::ServerRecord;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Histogram over a small integer domain with its mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `(value, count)` sorted by value; values never observed are absent
    pub counts: Vec<(u32, usize)>,
    /// Most frequent value, smallest on ties
    pub mode: Option<u32>,
    /// Share of observations at the mode
    pub consistency: f64,
}

impl Histogram {
    pub fn from_values(values: impl IntoIterator<Item = u32>) -> Self {
        let mut map: FxHashMap<u32, usize> = FxHashMap::default();
        for v in values {
            *map.entry(v).or_insert(0) += 1;
        }
        let mut counts: Vec<(u32, usize)> = map.into_iter().collect();
        counts.sort_unstable();

        let total: usize = counts.iter().map(|(_, c)| c).sum();
        let mut best: Option<(u32, usize)> = None;
        for &(value, count) in &counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((value, count));
            }
        }
        Self {
            counts,
            mode: best.map(|(v, _)| v),
            consistency: match best {
                Some((_, c)) if total > 0 => c as f64 / total as f64,
                _ => 0.0,
            },
        }
    }

    pub fn count_of(&self, value: u32) -> usize {
        self.counts
            .iter()
            .find(|(v, _)| *v == value)
            .map_or(0, |(_, c)| *c)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePatterns {
    /// Weekday index, 0 = Monday
    pub weekdays: Histogram,
    pub hours: Histogram,
    pub months: Histogram,
    pub mean_hours_between: Option<f64>,
    pub median_hours_between: Option<f64>,
}

impl TimePatterns {
    pub fn most_common_weekday_name(&self) -> Option<&'static str> {
        self.weekdays.mode.map(|d| WEEKDAY_NAMES[d as usize % 7])
    }
}

/// Hours between consecutive openings of chronologically sorted records.
pub fn gap_hours(records: &[ServerRecord]) -> Vec<f64> {
    records
        .windows(2)
        .map(|w| (w[1].opened_at - w[0].opened_at).num_seconds() as f64 / 3600.0)
        .collect()
}

/// `records` must be sorted chronologically.
pub fn analyze_time_patterns(records: &[ServerRecord]) -> TimePatterns {
    let gaps = gap_hours(records);
    TimePatterns {
        weekdays: Histogram::from_values(records.iter().map(|r| r.weekday_index())),
        hours: Histogram::from_values(records.iter().map(|r| r.hour())),
        months: Histogram::from_values(records.iter().map(|r| r.month())),
        mean_hours_between: mean(&gaps),
        median_hours_between: median(&gaps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_weekly_openings() {
        // 2024-01-01 is a Monday
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let records: Vec<ServerRecord> = (0..6)
            .map(|i| ServerRecord::new(i + 1, start + Duration::days(7 * i as i64), "A", 1))
            .collect();
        let patterns = analyze_time_patterns(&records);

        assert_eq!(patterns.weekdays.mode, Some(0));
        assert_eq!(patterns.most_common_weekday_name(), Some("Monday"));
        assert_eq!(patterns.weekdays.consistency, 1.0);
        assert_eq!(patterns.hours.mode, Some(10));
        assert_eq!(patterns.median_hours_between, Some(168.0));
        assert_eq!(patterns.months.count_of(2), 1);
        assert_eq!(patterns.months.mode, Some(1));
    }

    #[test]
    fn test_histogram_tie_takes_smallest() {
        let h = Histogram::from_values([20, 8, 20, 8, 3]);
        assert_eq!(h.mode, Some(8));
        assert!((h.consistency - 0.4).abs() < 1e-12);
        assert_eq!(h.counts, vec![(3, 1), (8, 2), (20, 2)]);
    }

    #[test]
    fn test_empty_records() {
        let patterns = analyze_time_patterns(&[]);
        assert_eq!(patterns.hours.mode, None);
        assert_eq!(patterns.hours.consistency, 0.0);
        assert_eq!(patterns.median_hours_between, None);
    }
}
