//! Order search bounds for automatic ARIMA/SARIMA selection.

use crate::models::Criterion;
use serde::{Deserialize, Serialize};

/// Seasonal part of the search grid. The period is fixed, P/D/Q are searched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalSearch {
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
    pub period: usize,
}

impl SeasonalSearch {
    /// Yearly seasonality over monthly buckets.
    pub fn monthly() -> Self {
        Self {
            max_p: 1,
            max_d: 1,
            max_q: 1,
            period: 12,
        }
    }

    /// Weekly seasonality over daily buckets.
    pub fn weekly() -> Self {
        Self {
            max_p: 1,
            max_d: 0,
            max_q: 1,
            period: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSearchConfig {
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
    /// Candidates with p + d + q above this are skipped
    pub max_total_order: usize,
    pub seasonal: Option<SeasonalSearch>,
    pub criterion: Criterion,
    /// Fit candidates on the rayon pool
    pub parallel: bool,
    /// Nelder-Mead iteration cap per candidate
    pub max_iterations: usize,
    /// Nelder-Mead relative objective tolerance
    pub tolerance: f64,
}

impl Default for OrderSearchConfig {
    fn default() -> Self {
        Self {
            max_p: 2,
            max_d: 1,
            max_q: 2,
            max_total_order: 4,
            seasonal: None,
            criterion: Criterion::Aic,
            parallel: true,
            max_iterations: 2_000,
            tolerance: 1e-9,
        }
    }
}
