//! Data model shared by providers, analyses and exporters.

pub mod prediction;
pub mod record;
pub mod series;

pub use prediction::{
    ConfidenceBreakdown, Criterion, Decomposition, DistrictPrediction, DistrictSignals,
    ForecastMethod, ForecastPoint, ForecastResult, ModelSpec, NextServerPrediction, Order,
    RotationPattern, SeasonalOrder,
};
pub use record::{sort_chronologically, MapType, ServerRecord};
pub use series::{Granularity, SeriesPoint, TimeSeries};
