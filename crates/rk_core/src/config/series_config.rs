//! Series building and forecasting settings.

use crate::models::Granularity;
use serde::{Deserialize, Serialize};

/// How raw records are bucketed into a series.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// Bucket width of the series fed to the forecaster
    pub granularity: Granularity,
    /// Fewer buckets than this is an insufficient-data error
    pub min_buckets: usize,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::Day,
            min_buckets: 2,
        }
    }
}

/// Forecast horizon, interval level and decomposition period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Buckets to forecast; beyond ~90 periods the intervals are not meaningful
    pub horizon: usize,
    /// Two-sided interval coverage, e.g. 0.95
    pub confidence_level: f64,
    /// Seasonal period for decomposition; `None` picks the granularity default
    pub decomposition_period: Option<usize>,
    /// Trailing window of the moving-average fallback
    pub naive_window: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 90,
            confidence_level: 0.95,
            decomposition_period: None,
            naive_window: 7,
        }
    }
}
