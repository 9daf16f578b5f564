//! # Analysis Configuration
//!
//! Every tunable used by the analytical core lives here and is passed
//! explicitly into each entry point. There is no process-wide settings object.
//!
//! ## Usage
//! ```rust
//! use rk_core::config::AnalysisConfig;
//!
//! let config = AnalysisConfig::default();
//! let quick = AnalysisConfig::quick();
//! assert!(quick.validate().is_ok());
//! ```
//!
//! ## Environment Variables
//!
//! - `RK_ANALYSIS_PROFILE`: Select preset (quick, seasonal, default)

mod pattern_config;
mod search_config;
mod series_config;

pub use pattern_config::{AlertConfig, DistrictConfig, NextServerConfig, RotationConfig};
pub use search_config::{OrderSearchConfig, SeasonalSearch};
pub use series_config::{ForecastConfig, SeriesConfig};

use crate::error::{ForecastError, Result};
use crate::models::Granularity;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const PROFILE_ENV: &str = "RK_ANALYSIS_PROFILE";

/// Shortest and longest rotation a map-type cycle may have.
pub const MIN_ROTATION_PERIOD: usize = 2;
pub const MAX_ROTATION_PERIOD: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    pub series: SeriesConfig,
    pub order_search: OrderSearchConfig,
    pub forecast: ForecastConfig,
    pub rotation: RotationConfig,
    pub district: DistrictConfig,
    pub next_server: NextServerConfig,
    pub alerts: AlertConfig,
}

impl AnalysisConfig {
    /// Small non-seasonal grid, sequential fits.
    pub fn quick() -> Self {
        let mut cfg = Self::default();
        cfg.order_search.max_p = 1;
        cfg.order_search.max_q = 1;
        cfg.order_search.max_total_order = 2;
        cfg.order_search.parallel = false;
        cfg.forecast.horizon = 30;
        cfg
    }

    /// Monthly buckets with a yearly seasonal search.
    pub fn seasonal() -> Self {
        let mut cfg = Self::default();
        cfg.series.granularity = Granularity::Month;
        cfg.order_search.seasonal = Some(SeasonalSearch::monthly());
        cfg.forecast.horizon = 12;
        cfg.forecast.decomposition_period = Some(12);
        cfg
    }

    pub fn from_profile(profile: &str) -> Option<Self> {
        match profile.trim().to_ascii_lowercase().as_str() {
            "quick" => Some(Self::quick()),
            "seasonal" => Some(Self::seasonal()),
            "default" | "" => Some(Self::default()),
            _ => None,
        }
    }

    /// Preset named by `RK_ANALYSIS_PROFILE`, default otherwise.
    pub fn from_env_or_default() -> Self {
        std::env::var(PROFILE_ENV)
            .ok()
            .and_then(|p| Self::from_profile(&p))
            .unwrap_or_default()
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a `.yaml`/`.yml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            other => Err(ForecastError::Config(format!(
                "unsupported config extension: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(ForecastError::Config(msg.to_string()));

        if self.series.min_buckets < 2 {
            return fail("series.min_buckets must be at least 2");
        }
        if !(self.forecast.confidence_level > 0.0 && self.forecast.confidence_level < 1.0) {
            return fail("forecast.confidence_level must be in (0, 1)");
        }
        if self.forecast.horizon == 0 {
            return fail("forecast.horizon must be positive");
        }
        if self.forecast.naive_window == 0 {
            return fail("forecast.naive_window must be positive");
        }
        if self.order_search.max_iterations == 0 || self.order_search.tolerance <= 0.0 {
            return fail("order_search needs positive max_iterations and tolerance");
        }
        if let Some(seasonal) = &self.order_search.seasonal {
            if seasonal.period < 2 {
                return fail("order_search.seasonal.period must be at least 2");
            }
        }
        let rot = &self.rotation;
        if rot.min_period < MIN_ROTATION_PERIOD
            || rot.min_period > rot.max_period
            || rot.max_period > MAX_ROTATION_PERIOD
        {
            return fail("rotation period bounds must satisfy 2 <= min_period <= max_period <= 5");
        }
        if !(0.0..=1.0).contains(&rot.threshold) {
            return fail("rotation.threshold must be in [0, 1]");
        }
        if rot.frequency_window == 0 {
            return fail("rotation.frequency_window must be positive");
        }
        if self.next_server.recent_window < 2 {
            return fail("next_server.recent_window must be at least 2");
        }
        if self.next_server.count == 0 {
            return fail("next_server.count must be positive");
        }
        let alerts = &self.alerts;
        if !(alerts.lead_hours >= 0.0 && alerts.window_hours > 0.0) {
            return fail("alerts need lead_hours >= 0 and window_hours > 0");
        }
        if alerts.lookahead == 0 {
            return fail("alerts.lookahead must be positive");
        }
        Ok(())
    }
}

// ========== Tests ==========

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.order_search.max_p, 2);
        assert_eq!(cfg.order_search.max_d, 1);
        assert_eq!(cfg.order_search.max_total_order, 4);
        assert!((cfg.rotation.threshold - 0.70).abs() < 1e-12);
        assert_eq!(cfg.forecast.horizon, 90);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(AnalysisConfig::quick().validate().is_ok());
        let seasonal = AnalysisConfig::seasonal();
        assert!(seasonal.validate().is_ok());
        assert_eq!(seasonal.series.granularity, Granularity::Month);
        assert_eq!(seasonal.order_search.seasonal.as_ref().map(|s| s.period), Some(12));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "rotation:\n  threshold: 0.8\nforecast:\n  horizon: 14\n";
        let cfg = AnalysisConfig::from_yaml_str(yaml).unwrap();
        assert!((cfg.rotation.threshold - 0.8).abs() < 1e-12);
        assert_eq!(cfg.rotation.max_period, 5);
        assert_eq!(cfg.forecast.horizon, 14);
        assert!((cfg.forecast.confidence_level - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut cfg = AnalysisConfig::default();
        cfg.forecast.confidence_level = 1.5;
        assert!(matches!(cfg.validate(), Err(ForecastError::Config(_))));

        let mut cfg = AnalysisConfig::default();
        cfg.rotation.min_period = 6;
        assert!(cfg.validate().is_err());

        let mut cfg = AnalysisConfig::default();
        cfg.rotation.min_period = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = AnalysisConfig::default();
        cfg.rotation.max_period = 9;
        assert!(matches!(cfg.validate(), Err(ForecastError::Config(_))));

        let mut cfg = AnalysisConfig::default();
        cfg.alerts.window_hours = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = AnalysisConfig::default();
        cfg.next_server.count = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let json = serde_json::to_string(&AnalysisConfig::quick()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let cfg = AnalysisConfig::load(file.path()).unwrap();
        assert_eq!(cfg.order_search.max_total_order, 2);
        assert!(!cfg.order_search.parallel);
    }

    #[test]
    fn test_profile_lookup() {
        assert!(AnalysisConfig::from_profile("QUICK").is_some());
        assert!(AnalysisConfig::from_profile("unknown").is_none());
    }

    #[test]
    fn test_profile_from_env() {
        std::env::set_var(PROFILE_ENV, "seasonal");
        let cfg = AnalysisConfig::from_env_or_default();
        std::env::set_var(PROFILE_ENV, "no-such-profile");
        let fallback = AnalysisConfig::from_env_or_default();
        std::env::remove_var(PROFILE_ENV);

        assert_eq!(cfg.series.granularity, Granularity::Month);
        assert_eq!(fallback.series.granularity, Granularity::default());
    }
}
