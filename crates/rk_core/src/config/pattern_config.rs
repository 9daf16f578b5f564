//! Rotation, district and next-server prediction settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub min_period: usize,
    pub max_period: usize,
    /// A candidate is accepted only when its consistency is strictly above this
    pub threshold: f64,
    /// Most recent labels scanned; `None` scans the whole history
    pub window: Option<usize>,
    /// Recent labels counted by the frequency fallback
    pub frequency_window: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            min_period: 2,
            max_period: 5,
            threshold: 0.70,
            window: Some(20),
            frequency_window: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistrictConfig {
    /// Most recent servers considered; `None` uses the whole history
    pub window: Option<usize>,
    /// Cramér's V below which map type says nothing about district
    pub min_correlation: f64,
}

impl Default for DistrictConfig {
    fn default() -> Self {
        Self {
            window: None,
            min_correlation: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NextServerConfig {
    /// Recent servers used for gap, hour and weekday statistics
    pub recent_window: usize,
    /// Snap to the dominant opening hour above this share
    pub hour_consistency: f64,
    /// Snap to the dominant weekday above this share
    pub day_consistency: f64,
    /// Gap coefficient of variation above which the forecast drives timing
    pub irregular_gap_cv: f64,
    /// Servers listed by the `next`, `rotation` and `export` commands by default
    pub count: usize,
}

impl Default for NextServerConfig {
    fn default() -> Self {
        Self {
            recent_window: 30,
            hour_consistency: 0.5,
            day_consistency: 0.5,
            irregular_gap_cv: 0.5,
            count: 5,
        }
    }
}

/// When an upcoming opening is announced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Hours before the estimated opening at which the alert window starts
    pub lead_hours: f64,
    /// Width of the alert window in hours
    pub window_hours: f64,
    /// Upcoming servers checked per run
    pub lookahead: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            lead_hours: 24.0,
            window_hours: 4.0,
            lookahead: 3,
        }
    }
}
