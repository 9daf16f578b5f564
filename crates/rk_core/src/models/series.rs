//! Regular, gap-free count series.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Bucket width of a [`TimeSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    /// ISO weeks, bucket dated on Monday
    Week,
    /// Calendar months, bucket dated on the 1st
    Month,
}

impl Granularity {
    /// Start of the bucket containing `date`.
    pub fn bucket_of(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                let back = date.weekday().num_days_from_monday() as u64;
                date.checked_sub_days(Days::new(back)).unwrap_or(date)
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
        }
    }

    /// Bucket `steps` widths after `bucket`.
    pub fn advance(self, bucket: NaiveDate, steps: usize) -> NaiveDate {
        let next = match self {
            Granularity::Day => bucket.checked_add_days(Days::new(steps as u64)),
            Granularity::Week => bucket.checked_add_days(Days::new(7 * steps as u64)),
            Granularity::Month => bucket.checked_add_months(Months::new(steps as u32)),
        };
        next.unwrap_or(NaiveDate::MAX)
    }

    /// Whole buckets from `from` to `to` (both bucket starts, `from <= to`).
    pub fn steps_between(self, from: NaiveDate, to: NaiveDate) -> usize {
        let steps = match self {
            Granularity::Day => (to - from).num_days(),
            Granularity::Week => (to - from).num_days() / 7,
            Granularity::Month => {
                (to.year() as i64 * 12 + to.month0() as i64)
                    - (from.year() as i64 * 12 + from.month0() as i64)
            }
        };
        steps.max(0) as usize
    }

    /// Seasonal period conventionally paired with this granularity.
    pub fn default_season(self) -> usize {
        match self {
            Granularity::Day => 7,
            Granularity::Week => 52,
            Granularity::Month => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub bucket: NaiveDate,
    pub count: f64,
}

/// Openings per bucket; every bucket between first and last is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub granularity: Granularity,
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn new(granularity: Granularity, points: Vec<SeriesPoint>) -> Self {
        Self {
            granularity,
            points,
        }
    }

    /// Build from raw values starting at `start` (tests, synthetic data).
    pub fn from_values(granularity: Granularity, start: NaiveDate, values: &[f64]) -> Self {
        let start = granularity.bucket_of(start);
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &count)| SeriesPoint {
                bucket: granularity.advance(start, i),
                count,
            })
            .collect();
        Self::new(granularity, points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.count).collect()
    }

    pub fn first_bucket(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.bucket)
    }

    pub fn last_bucket(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.bucket)
    }

    /// Bucket dates of the next `horizon` periods.
    pub fn future_buckets(&self, horizon: usize) -> Vec<NaiveDate> {
        match self.last_bucket() {
            Some(last) => (1..=horizon)
                .map(|h| self.granularity.advance(last, h))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.count).sum()
    }

    pub fn mean(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.total() / self.points.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_bucket_of() {
        // 2024-01-03 is a Wednesday
        assert_eq!(Granularity::Day.bucket_of(date(2024, 1, 3)), date(2024, 1, 3));
        assert_eq!(Granularity::Week.bucket_of(date(2024, 1, 3)), date(2024, 1, 1));
        assert_eq!(Granularity::Month.bucket_of(date(2024, 1, 31)), date(2024, 1, 1));
    }

    #[test]
    fn test_advance_and_steps() {
        let start = date(2024, 1, 1);
        assert_eq!(Granularity::Week.advance(start, 2), date(2024, 1, 15));
        assert_eq!(Granularity::Month.advance(start, 13), date(2025, 2, 1));
        assert_eq!(Granularity::Month.steps_between(start, date(2025, 2, 1)), 13);
        assert_eq!(Granularity::Day.steps_between(start, date(2024, 3, 1)), 60);
    }

    #[test]
    fn test_future_buckets() {
        let ts = TimeSeries::from_values(Granularity::Month, date(2024, 11, 20), &[1.0, 2.0]);
        assert_eq!(ts.last_bucket(), Some(date(2024, 12, 1)));
        assert_eq!(ts.future_buckets(2), vec![date(2025, 1, 1), date(2025, 2, 1)]);
        assert!((ts.mean() - 1.5).abs() < 1e-12);
    }
}
