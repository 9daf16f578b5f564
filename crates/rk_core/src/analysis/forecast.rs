//! # Forecaster
//!
//! Produces point forecasts with confidence intervals for a count series.
//!
//! ## Clipping
//!
//! Counts cannot be negative. Point values are clipped at zero and an
//! interval that would dip below zero is translated upwards instead of being
//! cut, so its width stays `2·z·σ_h` and widths never shrink with the
//! horizon.
//!
//! ## Degradation
//!
//! [`forecast_auto`] never fails on an unfittable series. When no candidate
//! model converges it falls back to a naive forecast and flags the outcome
//! as degraded so callers can lower their confidence.

use super::arima::{fit, FitOptions, FittedModel, RawForecast};
use super::decomposition::decompose;
use super::order_selection::select_model;
use super::stats::{mean, std_dev};
use crate::config::{AnalysisConfig, ForecastConfig};
use crate::error::{ForecastError, Result};
use crate::models::{
    Decomposition, ForecastMethod, ForecastPoint, ForecastResult, ModelSpec, TimeSeries,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Forecast plus the decomposition shown next to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutcome {
    pub result: ForecastResult,
    pub decomposition: Decomposition,
    /// True when the model fit failed and a naive method was used
    pub degraded: bool,
}

/// Forecast `series` with the fixed model `spec`.
pub fn forecast(series: &TimeSeries, spec: &ModelSpec, config: &ForecastConfig) -> Result<ForecastResult> {
    ensure_not_empty(series)?;
    let options = FitOptions {
        criterion: spec.criterion,
        ..FitOptions::default()
    };
    let model = fit(&series.values(), spec.order, spec.seasonal, &options)?;
    from_model(series, &model, config)
}

/// Select an order, fit and forecast; naive fallback when nothing fits.
pub fn forecast_auto(series: &TimeSeries, config: &AnalysisConfig) -> Result<ForecastOutcome> {
    ensure_not_empty(series)?;
    let period = config
        .forecast
        .decomposition_period
        .unwrap_or_else(|| series.granularity.default_season());
    let decomposition = decompose(series, period);

    let modelled = select_model(&series.values(), &config.order_search)
        .and_then(|model| from_model(series, &model, &config.forecast));

    match modelled {
        Ok(result) => Ok(ForecastOutcome {
            result,
            decomposition,
            degraded: false,
        }),
        Err(err) if err.is_recoverable() => {
            let result = naive_forecast(series, &config.forecast);
            warn!(error = %err, method = ?result.method, "model fit failed, using naive forecast");
            Ok(ForecastOutcome {
                result,
                decomposition,
                degraded: true,
            })
        }
        Err(err) => Err(err),
    }
}

/// Last value, or a trailing mean once the series covers `naive_window`.
pub fn naive_forecast(series: &TimeSeries, config: &ForecastConfig) -> ForecastResult {
    let values = series.values();
    let window = config.naive_window;
    let (level, method) = if values.len() >= window && window > 1 {
        let tail = &values[values.len() - window..];
        (mean(tail).unwrap_or(0.0), ForecastMethod::MovingAverage { window })
    } else {
        (values.last().copied().unwrap_or(0.0), ForecastMethod::LastValue)
    };

    let steps: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let sigma = std_dev(&steps).unwrap_or(0.0);
    let raw = RawForecast {
        mean: vec![level; config.horizon],
        std_err: (1..=config.horizon).map(|h| sigma * (h as f64).sqrt()).collect(),
    };

    ForecastResult {
        points: clip_points(series, &raw, config.confidence_level),
        confidence_level: config.confidence_level,
        method,
        model: None,
    }
}

fn from_model(series: &TimeSeries, model: &FittedModel, config: &ForecastConfig) -> Result<ForecastResult> {
    let raw = model.forecast(config.horizon);
    if raw.mean.iter().chain(&raw.std_err).any(|v| !v.is_finite()) {
        return Err(ForecastError::ModelFit(format!(
            "{} produced a non-finite forecast",
            model.spec
        )));
    }
    info!(model = %model.spec, horizon = config.horizon, "forecast produced");
    Ok(ForecastResult {
        points: clip_points(series, &raw, config.confidence_level),
        confidence_level: config.confidence_level,
        method: ForecastMethod::Model,
        model: Some(model.spec),
    })
}

fn clip_points(series: &TimeSeries, raw: &RawForecast, level: f64) -> Vec<ForecastPoint> {
    series
        .future_buckets(raw.mean.len())
        .into_iter()
        .zip(raw.mean.iter().zip(raw.half_widths(level)))
        .map(|(bucket, (&centre, half))| {
            let lower = (centre - half).max(0.0);
            ForecastPoint {
                bucket,
                value: centre.max(0.0),
                lower,
                upper: lower + 2.0 * half,
            }
        })
        .collect()
}

fn ensure_not_empty(series: &TimeSeries) -> Result<()> {
    if series.is_empty() {
        return Err(ForecastError::insufficient("time series buckets", 1, 0));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::stats::normal_quantile;
    use crate::models::{Granularity, Order};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn sparse_daily(n: usize) -> TimeSeries {
        // One opening roughly every third day
        let values: Vec<f64> = (0..n).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }).collect();
        TimeSeries::from_values(Granularity::Day, start(), &values)
    }

    fn assert_well_formed(result: &ForecastResult) {
        for point in &result.points {
            assert!(point.value >= 0.0);
            assert!(point.lower >= 0.0);
            assert!(point.lower <= point.upper);
        }
        for pair in result.points.windows(2) {
            assert!(pair[1].width() >= pair[0].width() - 1e-9);
        }
    }

    #[test]
    fn test_fixed_spec_forecast() {
        let series = sparse_daily(90);
        let spec = ModelSpec::fixed(Order::new(1, 0, 0), None);
        let config = ForecastConfig {
            horizon: 30,
            ..ForecastConfig::default()
        };
        let result = forecast(&series, &spec, &config).unwrap();
        assert_eq!(result.horizon(), 30);
        assert_eq!(result.points[0].bucket, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert_eq!(result.method, ForecastMethod::Model);
        assert_well_formed(&result);
    }

    #[test]
    fn test_auto_forecast_widths_grow() {
        let series = sparse_daily(120);
        let mut config = AnalysisConfig::quick();
        config.forecast.horizon = 30;
        let outcome = forecast_auto(&series, &config).unwrap();
        assert!(!outcome.degraded);
        assert_eq!(outcome.decomposition.observed.len(), 120);
        assert_eq!(outcome.decomposition.period, Some(7));
        assert_well_formed(&outcome.result);
    }

    #[test]
    fn test_clipped_interval_is_translated() {
        let series = TimeSeries::from_values(Granularity::Day, start(), &[0.0]);
        let raw = RawForecast {
            mean: vec![-0.5, 0.2],
            std_err: vec![1.0, 1.0],
        };
        let points = clip_points(&series, &raw, 0.95);
        let half = normal_quantile(0.975);
        assert_eq!(points[0].value, 0.0);
        assert_eq!(points[0].lower, 0.0);
        assert!((points[0].width() - 2.0 * half).abs() < 1e-12);
        assert!((points[1].value - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_degraded_fallback_on_tiny_series() {
        let series = TimeSeries::from_values(Granularity::Day, start(), &[1.0, 0.0]);
        let outcome = forecast_auto(&series, &AnalysisConfig::quick()).unwrap();
        assert!(outcome.degraded);
        assert_eq!(outcome.result.method, ForecastMethod::LastValue);
        assert!(outcome.result.method.is_naive());
        assert!(outcome.result.model.is_none());
        assert_eq!(outcome.result.values()[0], 0.0);
        assert_well_formed(&outcome.result);
    }

    #[test]
    fn test_moving_average_fallback() {
        let values = [2.0, 0.0, 1.0, 3.0, 0.0, 1.0, 2.0, 1.0];
        let series = TimeSeries::from_values(Granularity::Day, start(), &values);
        let config = ForecastConfig {
            horizon: 5,
            naive_window: 4,
            ..ForecastConfig::default()
        };
        let result = naive_forecast(&series, &config);
        assert_eq!(result.method, ForecastMethod::MovingAverage { window: 4 });
        assert!((result.points[0].value - 1.0).abs() < 1e-12);
        assert_well_formed(&result);
    }

    #[test]
    fn test_empty_series_is_insufficient() {
        let series = TimeSeries::new(Granularity::Day, Vec::new());
        let err = forecast_auto(&series, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { .. }));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_forecast_non_negative_and_widening(
            counts in proptest::collection::vec(0u8..4, 20..60),
            horizon in 1usize..=30
        ) {
            let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
            let series = TimeSeries::from_values(Granularity::Day, start(), &values);
            let mut config = AnalysisConfig::quick();
            config.forecast.horizon = horizon;
            let outcome = forecast_auto(&series, &config).unwrap();

            prop_assert_eq!(outcome.result.horizon(), horizon);
            for point in &outcome.result.points {
                prop_assert!(point.value >= 0.0);
                prop_assert!(point.lower >= 0.0);
            }
            for pair in outcome.result.points.windows(2) {
                prop_assert!(pair[1].width() >= pair[0].width() - 1e-9);
            }
        }
    }
}
