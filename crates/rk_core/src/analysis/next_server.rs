//! # Next-Server Predictor
//!
//! Combines the other analyses into one prediction per upcoming server:
//!
//! 1. Daily opening series and its forecast
//! 2. Timing from the median recent gap, snapped to habitual hour/weekday
//! 3. Server id from the modal id step
//! 4. Map type from the rotation detector
//! 5. District from the district predictor
//!
//! The overall confidence is the weakest of the component confidences.

use super::district::{modal_id_step, predict_district};
use super::forecast::{forecast_auto, ForecastOutcome};
use super::rotation::predict_map_types;
use super::series::{build_series, SeriesFilter};
use super::stats::{coefficient_of_variation, median};
use super::time_patterns::{analyze_time_patterns, gap_hours};
use crate::config::AnalysisConfig;
use crate::error::{ForecastError, Result};
use crate::models::{
    sort_chronologically, ConfidenceBreakdown, Granularity, MapType, NextServerPrediction,
    ServerRecord,
};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use tracing::{info, warn};

/// Timing evidence shared by every predicted server.
struct Timing {
    median_gap_hours: f64,
    gap_cv: f64,
    hour: Option<u32>,
    weekday: Option<u32>,
    forecast: Option<ForecastOutcome>,
}

impl Timing {
    fn confidence(&self) -> f64 {
        let regularity = 1.0 / (1.0 + self.gap_cv);
        match &self.forecast {
            Some(outcome) if !outcome.degraded => regularity,
            _ => regularity / 2.0,
        }
    }
}

fn daily_forecast(records: &[ServerRecord], config: &AnalysisConfig) -> Result<Option<ForecastOutcome>> {
    let series = match build_series(records, Granularity::Day, &SeriesFilter::all(), &config.series) {
        Ok(series) => series,
        Err(err @ ForecastError::InsufficientData { .. }) => {
            warn!(error = %err, "no daily series, timing falls back to gap statistics");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    forecast_auto(&series, config).map(Some)
}

fn timing_evidence(records: &[ServerRecord], config: &AnalysisConfig) -> Result<Timing> {
    let window = config.next_server.recent_window.min(records.len());
    let recent = &records[records.len() - window..];
    let gaps = gap_hours(recent);
    let median_gap_hours = median(&gaps).unwrap_or(24.0).max(0.0);
    let gap_cv = coefficient_of_variation(&gaps).unwrap_or(0.0);

    let patterns = analyze_time_patterns(recent);
    let hour = patterns
        .hours
        .mode
        .filter(|_| patterns.hours.consistency > config.next_server.hour_consistency);
    let weekday = patterns
        .weekdays
        .mode
        .filter(|_| patterns.weekdays.consistency > config.next_server.day_consistency);

    Ok(Timing {
        median_gap_hours,
        gap_cv,
        hour,
        weekday,
        forecast: daily_forecast(records, config)?,
    })
}

/// Estimated opening of the `k`-th upcoming server, strictly after `floor`.
fn estimate_time(
    timing: &Timing,
    last: &ServerRecord,
    k: usize,
    floor: DateTime<Utc>,
    config: &AnalysisConfig,
) -> DateTime<Utc> {
    let minutes = (timing.median_gap_hours * 60.0 * k as f64).round() as i64;
    let mut estimate = last.opened_at + Duration::minutes(minutes);

    if timing.gap_cv > config.next_server.irregular_gap_cv {
        let crossing = timing.forecast.as_ref().and_then(|outcome| {
            let steps = outcome.result.steps_until_cumulative(k as f64)?;
            let day = outcome.result.points.get(steps - 1)?.bucket;
            Some((steps, day))
        });
        if let Some((steps, day)) = crossing {
            let time_of_day = last.opened_at.time();
            estimate = Utc.from_utc_datetime(&day.and_time(time_of_day));
            info!(steps, %estimate, "irregular gaps, timing from forecast crossing");
        } else {
            warn!(k, "forecast never reaches the next opening, keeping median gap");
        }
    }

    if let Some(hour) = timing.hour {
        if let Some(snapped) = estimate
            .with_hour(hour)
            .and_then(|t| t.with_minute(0))
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
        {
            estimate = snapped;
        }
    }
    if let Some(weekday) = timing.weekday {
        let current = estimate.weekday().num_days_from_monday() as i64;
        let forward = (weekday as i64 - current).rem_euclid(7);
        estimate += Duration::days(forward);
    }

    let step = if timing.weekday.is_some() {
        Duration::days(7)
    } else {
        Duration::days(1)
    };
    while estimate <= floor {
        estimate += step;
    }
    estimate
}

/// Predict the next `n` servers after the latest record.
///
/// `now` is the reference time for the countdowns, which are negative once
/// an estimated opening has passed.
pub fn predict_next_servers(
    records: &[ServerRecord],
    n: usize,
    config: &AnalysisConfig,
    now: DateTime<Utc>,
) -> Result<Vec<NextServerPrediction>> {
    if records.len() < 2 {
        return Err(ForecastError::insufficient("server records", 2, records.len()));
    }
    let mut history = records.to_vec();
    sort_chronologically(&mut history);
    let Some(last) = history.last().cloned() else {
        return Ok(Vec::new());
    };

    let timing = timing_evidence(&history, config)?;
    let timing_confidence = timing.confidence();

    let last_id = history.iter().map(|r| r.id).max().unwrap_or(last.id);
    let (id_step, id_confidence) = modal_id_step(&history).unwrap_or((1, 0.0));

    let maps: Vec<MapType> = history.iter().map(|r| r.map_type.clone()).collect();
    let map_forecast = predict_map_types(&maps, n, &config.rotation)?;

    let mut predictions = Vec::with_capacity(n);
    let mut floor = last.opened_at;
    for k in 1..=n {
        let estimated_open_time = estimate_time(&timing, &last, k, floor, config);
        floor = estimated_open_time;

        let server_id = last_id.saturating_add(id_step.saturating_mul(k as u32));
        let map_type = map_forecast.labels[k - 1].clone();
        let district = predict_district(
            &history,
            &map_type,
            server_id,
            map_forecast.pattern.as_ref(),
            config,
        );

        let components = ConfidenceBreakdown {
            timing: timing_confidence,
            map_type: map_forecast.confidence,
            district: district.confidence,
            server_id: id_confidence,
        };
        let prediction = NextServerPrediction {
            server_id,
            estimated_open_time,
            predicted_map_type: map_type,
            predicted_district_id: district.predicted_district_id,
            confidence: components.overall(),
            countdown_seconds: (estimated_open_time - now).num_seconds(),
            components,
        };
        info!(
            server_id,
            open = %prediction.estimated_open_time,
            map = %prediction.predicted_map_type,
            district = prediction.predicted_district_id,
            confidence = prediction.confidence,
            "next server predicted"
        );
        predictions.push(prediction);
    }
    Ok(predictions)
}

/// Predict the single next server.
pub fn predict_next_server(
    records: &[ServerRecord],
    config: &AnalysisConfig,
    now: DateTime<Utc>,
) -> Result<NextServerPrediction> {
    predict_next_servers(records, 1, config, now)?
        .into_iter()
        .next()
        .ok_or_else(|| ForecastError::PredictionUnavailable("no prediction produced".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekly(n: u32, hour: u32) -> Vec<ServerRecord> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let map = if i % 2 == 0 { "A" } else { "B" };
                ServerRecord::new(100 + i, start + Duration::days(7 * i as i64), map, 5)
            })
            .collect()
    }

    #[test]
    fn test_regular_weekly_schedule() {
        let records = weekly(8, 12);
        let now = Utc.with_ymd_and_hms(2024, 2, 20, 0, 0, 0).unwrap();
        let config = AnalysisConfig::quick();
        let prediction = predict_next_server(&records, &config, now).unwrap();

        assert_eq!(prediction.server_id, 108);
        assert_eq!(
            prediction.estimated_open_time,
            Utc.with_ymd_and_hms(2024, 2, 26, 12, 0, 0).unwrap()
        );
        assert_eq!(prediction.predicted_map_type, MapType::new("A"));
        assert_eq!(prediction.predicted_district_id, 5);
        assert_eq!(prediction.components.server_id, 1.0);
        assert!(prediction.confidence <= prediction.components.timing);
        assert!(prediction.countdown_seconds > 0);
    }

    #[test]
    fn test_several_servers_are_increasing() {
        let records = weekly(8, 9);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let predictions = predict_next_servers(&records, 3, &AnalysisConfig::quick(), now).unwrap();
        assert_eq!(predictions.len(), 3);
        assert_eq!(predictions[2].server_id, 110);
        for pair in predictions.windows(2) {
            assert!(pair[1].estimated_open_time > pair[0].estimated_open_time);
        }
        assert_eq!(predictions[1].predicted_map_type, MapType::new("B"));
    }

    #[test]
    fn test_overdue_countdown_is_negative() {
        let records = weekly(4, 12);
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let prediction = predict_next_server(&records, &AnalysisConfig::quick(), now).unwrap();
        assert!(prediction.is_overdue());
        assert!(prediction.estimated_open_time > records[3].opened_at);
    }

    #[test]
    fn test_same_day_records_still_predict_after_last() {
        let t = Utc.with_ymd_and_hms(2024, 5, 5, 8, 0, 0).unwrap();
        let records = vec![
            ServerRecord::new(1, t, "A", 1),
            ServerRecord::new(2, t + Duration::hours(2), "A", 1),
        ];
        let prediction = predict_next_server(&records, &AnalysisConfig::quick(), t).unwrap();
        assert!(prediction.estimated_open_time > records[1].opened_at);
        // Single-bucket series: no forecast, halved timing confidence
        assert!(prediction.components.timing <= 0.5);
    }

    #[test]
    fn test_needs_two_records() {
        let records = weekly(1, 12);
        let err = predict_next_server(&records, &AnalysisConfig::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { needed: 2, found: 1, .. }));
    }
}
