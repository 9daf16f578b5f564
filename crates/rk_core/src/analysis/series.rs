//! # Series Builder
//!
//! Turns the raw record sequence into a regular count series. Forecasting
//! and decomposition need regular sampling, so every bucket between the
//! first and last filtered opening is present, empty ones with count 0.

use crate::config::SeriesConfig;
use crate::error::{ForecastError, Result};
use crate::models::{Granularity, MapType, SeriesPoint, ServerRecord, TimeSeries};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Record filter mirroring the dashboard's filter widgets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesFilter {
    /// Keep only these map types
    pub map_types: Option<BTreeSet<MapType>>,
    /// Inclusive lower bound on the opening date
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the opening date
    pub to: Option<NaiveDate>,
    pub year: Option<i32>,
}

impl SeriesFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_map_types<I, M>(mut self, map_types: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MapType>,
    {
        self.map_types = Some(map_types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn matches(&self, record: &ServerRecord) -> bool {
        let date = record.open_date();
        if let Some(types) = &self.map_types {
            if !types.contains(&record.map_type) {
                return false;
            }
        }
        if self.from.is_some_and(|from| date < from) {
            return false;
        }
        if self.to.is_some_and(|to| date > to) {
            return false;
        }
        if self.year.is_some_and(|year| date.year() != year) {
            return false;
        }
        true
    }

    pub fn apply(&self, records: &[ServerRecord]) -> Vec<ServerRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

/// Bucket filtered openings into a zero-filled series.
pub fn build_series(
    records: &[ServerRecord],
    granularity: Granularity,
    filter: &SeriesFilter,
    config: &SeriesConfig,
) -> Result<TimeSeries> {
    let mut counts: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records.iter().filter(|r| filter.matches(r)) {
        *counts
            .entry(granularity.bucket_of(record.open_date()))
            .or_insert(0.0) += 1.0;
    }

    let (first, last) = match (counts.keys().next(), counts.keys().next_back()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => {
            return Err(ForecastError::insufficient(
                "filtered records",
                1,
                0,
            ))
        }
    };

    let bucket_count = granularity.steps_between(first, last) + 1;
    if bucket_count < config.min_buckets {
        return Err(ForecastError::insufficient(
            "time series buckets",
            config.min_buckets,
            bucket_count,
        ));
    }

    let points = (0..bucket_count)
        .map(|i| {
            let bucket = granularity.advance(first, i);
            SeriesPoint {
                bucket,
                count: counts.get(&bucket).copied().unwrap_or(0.0),
            }
        })
        .collect();

    Ok(TimeSeries::new(granularity, points))
}

/// Daily and monthly series in one pass, as the prediction tab shows them.
pub fn daily_and_monthly(
    records: &[ServerRecord],
    filter: &SeriesFilter,
    config: &SeriesConfig,
) -> Result<(TimeSeries, TimeSeries)> {
    let daily = build_series(records, Granularity::Day, filter, config)?;
    let monthly = build_series(records, Granularity::Month, filter, &SeriesConfig {
        min_buckets: 1,
        ..config.clone()
    })?;
    Ok((daily, monthly))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn weekly_records(n: usize) -> Vec<ServerRecord> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let map = if i % 2 == 0 { "A" } else { "B" };
                ServerRecord::new(i as u32 + 1, start + Duration::days(7 * i as i64), map, 1)
            })
            .collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_series_zero_fills_gaps() {
        let records = weekly_records(3);
        let ts = build_series(&records, Granularity::Day, &SeriesFilter::all(), &SeriesConfig::default())
            .unwrap();
        assert_eq!(ts.len(), 15);
        assert_eq!(ts.values().iter().sum::<f64>(), 3.0);
        assert_eq!(ts.points[1].count, 0.0);
        assert_eq!(ts.points[7].count, 1.0);
    }

    #[test]
    fn test_weekly_series_one_per_bucket() {
        let records = weekly_records(10);
        let ts = build_series(&records, Granularity::Week, &SeriesFilter::all(), &SeriesConfig::default())
            .unwrap();
        assert_eq!(ts.len(), 10);
        assert!(ts.values().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_map_type_filter() {
        let records = weekly_records(6);
        let filter = SeriesFilter::all().with_map_types(["B"]);
        let ts = build_series(&records, Granularity::Day, &filter, &SeriesConfig::default()).unwrap();
        // B servers open on days 7, 21, 35
        assert_eq!(ts.first_bucket(), Some(date(2024, 1, 8)));
        assert_eq!(ts.len(), 29);
        assert_eq!(ts.total(), 3.0);
    }

    #[test]
    fn test_date_range_and_year_filters() {
        let records = weekly_records(10);
        let filter = SeriesFilter::all().with_range(Some(date(2024, 1, 8)), Some(date(2024, 1, 22)));
        assert_eq!(filter.apply(&records).len(), 3);
        assert!(SeriesFilter::all().with_year(2023).apply(&records).is_empty());
    }

    #[test]
    fn test_insufficient_data() {
        let records = weekly_records(1);
        let err = build_series(&records, Granularity::Day, &SeriesFilter::all(), &SeriesConfig::default())
            .unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { found: 1, .. }));

        let err = build_series(&[], Granularity::Day, &SeriesFilter::all(), &SeriesConfig::default())
            .unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { found: 0, .. }));
    }

    #[test]
    fn test_daily_and_monthly() {
        let records = weekly_records(10);
        let (daily, monthly) =
            daily_and_monthly(&records, &SeriesFilter::all(), &SeriesConfig::default()).unwrap();
        assert_eq!(daily.len(), 64);
        assert_eq!(monthly.len(), 3);
        assert_eq!(monthly.total(), 10.0);
    }

    proptest! {
        #[test]
        fn prop_bucket_count_matches_span(
            offsets in proptest::collection::vec(0i64..400, 2..40),
            granularity in prop_oneof![
                Just(Granularity::Day),
                Just(Granularity::Week),
                Just(Granularity::Month)
            ]
        ) {
            let start = Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap();
            let records: Vec<ServerRecord> = offsets
                .iter()
                .enumerate()
                .map(|(i, &d)| ServerRecord::new(i as u32, start + Duration::days(d), "A", 1))
                .collect();
            let config = SeriesConfig { granularity, min_buckets: 1 };
            let ts = build_series(&records, granularity, &SeriesFilter::all(), &config).unwrap();

            let first = ts.first_bucket().unwrap();
            let last = ts.last_bucket().unwrap();
            prop_assert_eq!(ts.len(), granularity.steps_between(first, last) + 1);
            prop_assert_eq!(ts.total() as usize, records.len());
            for pair in ts.points.windows(2) {
                prop_assert_eq!(granularity.advance(pair[0].bucket, 1), pair[1].bucket);
            }
        }
    }
}
