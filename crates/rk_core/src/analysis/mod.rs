//! Analytical core: series building, forecasting and pattern prediction.
//!
//! Every entry point is a pure function of its inputs and the explicit
//! [`AnalysisConfig`](crate::config::AnalysisConfig) it receives.

pub mod alerts;
pub mod arima;
pub mod decomposition;
pub mod district;
pub mod forecast;
pub mod next_server;
pub mod optimize;
pub mod order_selection;
pub mod rotation;
pub mod series;
pub mod stats;
pub mod summary;
pub mod time_patterns;

pub use alerts::{due_alerts, format_alert, Alert};
pub use arima::{fit, FitOptions, FittedModel};
pub use decomposition::decompose;
pub use district::{cramers_v, predict_district};
pub use forecast::{forecast, forecast_auto, naive_forecast, ForecastOutcome};
pub use next_server::{predict_next_server, predict_next_servers};
pub use order_selection::{candidate_grid, select_model, select_order};
pub use rotation::{
    detect_rotation, pattern_compliance, predict_labels, predict_map_types, transition_matrix,
    LabelForecast, LabelMethod, MapTypeForecast, PatternCompliance, TransitionMatrix,
};
pub use series::{build_series, daily_and_monthly, SeriesFilter};
pub use summary::{
    calculate_statistics, district_counts, district_map_crosstab, year_over_year,
    yearly_map_types, DatasetSummary, DistrictMapTable, MonthComparison, YearlyMapShare,
};
pub use time_patterns::{analyze_time_patterns, TimePatterns};
