//! Value objects produced by the analytical core.
//!
//! Everything here is computed fresh per analysis request and never mutated
//! after construction. All types serialize to plain data for the
//! presentation and export layers.

use super::record::MapType;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Model specification
// ============================================================================

/// Non-seasonal ARIMA order (p, d, q).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Order {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl Order {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

/// Seasonal order (P, D, Q, s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub period: usize,
}

impl SeasonalOrder {
    pub const fn new(p: usize, d: usize, q: usize, period: usize) -> Self {
        Self { p, d, q, period }
    }

    /// A seasonal part with every order zero contributes nothing.
    pub fn is_trivial(&self) -> bool {
        self.p == 0 && self.d == 0 && self.q == 0
    }
}

/// Information criterion used to rank candidate models (lower is better).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    #[default]
    Aic,
    Aicc,
    Bic,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Criterion::Aic => write!(f, "AIC"),
            Criterion::Aicc => write!(f, "AICc"),
            Criterion::Bic => write!(f, "BIC"),
        }
    }
}

/// Selected model configuration and its criterion score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub order: Order,
    pub seasonal: Option<SeasonalOrder>,
    pub criterion: Criterion,
    pub score: f64,
}

impl ModelSpec {
    /// Spec with an unknown score, for fitting a fixed order directly.
    pub fn fixed(order: Order, seasonal: Option<SeasonalOrder>) -> Self {
        Self {
            order,
            seasonal,
            criterion: Criterion::Aic,
            score: f64::NAN,
        }
    }

    /// Number of ARMA coefficients (AR + MA, seasonal included).
    pub fn parameter_count(&self) -> usize {
        let seasonal = self.seasonal.map(|s| s.p + s.q).unwrap_or(0);
        self.order.p + self.order.q + seasonal
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let o = self.order;
        match self.seasonal {
            Some(s) if !s.is_trivial() => write!(
                f,
                "SARIMA({},{},{})({},{},{})[{}]",
                o.p, o.d, o.q, s.p, s.d, s.q, s.period
            ),
            _ => write!(f, "ARIMA({},{},{})", o.p, o.d, o.q),
        }
    }
}

// ============================================================================
// Forecast
// ============================================================================

/// How a forecast was produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForecastMethod {
    Model,
    /// Repeat the last observation
    LastValue,
    /// Mean of the trailing `window` observations
    MovingAverage { window: usize },
}

impl ForecastMethod {
    pub fn is_naive(&self) -> bool {
        !matches!(self, ForecastMethod::Model)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub bucket: NaiveDate,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ForecastPoint {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub points: Vec<ForecastPoint>,
    pub confidence_level: f64,
    pub method: ForecastMethod,
    pub model: Option<ModelSpec>,
}

impl ForecastResult {
    pub fn horizon(&self) -> usize {
        self.points.len()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Step (1-based) at which the cumulative forecast first reaches `target`.
    pub fn steps_until_cumulative(&self, target: f64) -> Option<usize> {
        let mut total = 0.0;
        for (i, point) in self.points.iter().enumerate() {
            total += point.value;
            if total >= target {
                return Some(i + 1);
            }
        }
        None
    }
}

/// Additive decomposition aligned to the input series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    /// Seasonal period used, `None` when the series was too short for one
    pub period: Option<usize>,
    pub observed: Vec<f64>,
    pub trend: Vec<Option<f64>>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<Option<f64>>,
}

// ============================================================================
// Rotation / district / next server
// ============================================================================

/// A repeating unit of labels, most recent cycle last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationPattern<T> {
    pub period_length: usize,
    pub sequence: Vec<T>,
    pub consistency_score: f64,
    /// Historical positions the score was computed over
    pub compared: usize,
}

impl<T: Clone> RotationPattern<T> {
    /// Label `k` steps after the last observation (`k >= 1`).
    pub fn predict_nth(&self, k: usize) -> &T {
        &self.sequence[(k.max(1) - 1) % self.period_length]
    }

    pub fn predict_next(&self, n: usize) -> Vec<T> {
        (1..=n).map(|k| self.predict_nth(k).clone()).collect()
    }
}

/// Per-signal votes behind a district prediction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictSignals {
    /// District most often paired with the predicted map type
    pub co_occurrence: Option<u32>,
    /// District implied by the district progression over server ids
    pub progression: Option<u32>,
    /// District implied by the map/district association
    pub correlation: Option<u32>,
}

impl DistrictSignals {
    pub fn votes(&self) -> [Option<u32>; 3] {
        [self.co_occurrence, self.progression, self.correlation]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictPrediction {
    pub server_id: u32,
    pub predicted_district_id: u32,
    pub confidence: f64,
    pub signals: DistrictSignals,
}

/// Sub-confidences combined into the overall next-server confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub timing: f64,
    pub map_type: f64,
    pub district: f64,
    pub server_id: f64,
}

impl ConfidenceBreakdown {
    /// Weakest component.
    pub fn overall(&self) -> f64 {
        self.timing
            .min(self.map_type)
            .min(self.district)
            .min(self.server_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextServerPrediction {
    pub server_id: u32,
    pub estimated_open_time: DateTime<Utc>,
    pub predicted_map_type: MapType,
    pub predicted_district_id: u32,
    pub confidence: f64,
    /// Seconds from the reference time to the estimated opening (negative when overdue)
    pub countdown_seconds: i64,
    pub components: ConfidenceBreakdown,
}

impl NextServerPrediction {
    pub fn countdown(&self) -> Duration {
        Duration::seconds(self.countdown_seconds)
    }

    pub fn is_overdue(&self) -> bool {
        self.countdown_seconds < 0
    }

    /// Human readable countdown, e.g. `3d 4h`.
    pub fn countdown_label(&self) -> String {
        if self.is_overdue() {
            return "should already be open".to_string();
        }
        let hours = self.countdown_seconds / 3600;
        format!("{}d {}h", hours / 24, hours % 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_spec_display() {
        let arima = ModelSpec::fixed(Order::new(1, 1, 0), None);
        assert_eq!(arima.to_string(), "ARIMA(1,1,0)");

        let sarima = ModelSpec::fixed(Order::new(1, 1, 1), Some(SeasonalOrder::new(1, 1, 0, 12)));
        assert_eq!(sarima.to_string(), "SARIMA(1,1,1)(1,1,0)[12]");
        assert_eq!(sarima.parameter_count(), 3);
    }

    #[test]
    fn test_rotation_pattern_cycles() {
        let pattern = RotationPattern {
            period_length: 3,
            sequence: vec!['B', 'C', 'A'],
            consistency_score: 1.0,
            compared: 7,
        };
        assert_eq!(*pattern.predict_nth(1), 'B');
        assert_eq!(pattern.predict_next(5), vec!['B', 'C', 'A', 'B', 'C']);
    }

    #[test]
    fn test_confidence_breakdown_takes_minimum() {
        let breakdown = ConfidenceBreakdown {
            timing: 0.9,
            map_type: 1.0,
            district: 2.0 / 3.0,
            server_id: 1.0,
        };
        assert!((breakdown.overall() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_cumulative_crossing() {
        let point = |value| ForecastPoint {
            bucket: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            value,
            lower: 0.0,
            upper: value * 2.0,
        };
        let result = ForecastResult {
            points: vec![point(0.4), point(0.4), point(0.4)],
            confidence_level: 0.95,
            method: ForecastMethod::Model,
            model: None,
        };
        assert_eq!(result.steps_until_cumulative(1.0), Some(3));
        assert_eq!(result.steps_until_cumulative(2.0), None);
    }
}
