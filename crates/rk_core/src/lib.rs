//! # rk_core - Server-Opening Forecast Engine
//!
//! Predictive analytics over the historical server openings of a mobile
//! strategy game.
//!
//! ## Features
//! - Regular count series from raw opening records (day/week/month buckets)
//! - ARIMA/SARIMA fitting with automatic, deterministic order selection
//! - Forecasts with non-negative, monotone confidence intervals
//! - Rotation-pattern detection for map types and districts
//! - Next-server prediction (time, id, map type, district, confidence)
//!
//! ## Usage
//! ```rust
//! use rk_core::config::AnalysisConfig;
//! use rk_core::data::{DataProvider, SampleProvider};
//!
//! let records = SampleProvider.fetch().unwrap();
//! let stats = rk_core::analysis::calculate_statistics(&records);
//! assert_eq!(stats.total_servers, 7);
//! assert!(AnalysisConfig::default().validate().is_ok());
//! ```

// Numeric code indexes several parallel buffers at once
#![allow(clippy::needless_range_loop)]

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod models;

pub use analysis::{
    build_series, calculate_statistics, decompose, detect_rotation, forecast, forecast_auto,
    predict_district, predict_map_types, predict_next_server, predict_next_servers, select_order,
    ForecastOutcome, SeriesFilter,
};
pub use config::AnalysisConfig;
pub use error::{ForecastError, Result};
pub use models::{
    DistrictPrediction, ForecastResult, Granularity, MapType, ModelSpec, NextServerPrediction,
    RotationPattern, ServerRecord, TimeSeries,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
