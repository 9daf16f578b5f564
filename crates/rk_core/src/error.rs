use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Insufficient data for {what}: need at least {needed}, found {found}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        found: usize,
    },

    #[error("Model fit failed: {0}")]
    ModelFit(String),

    #[error("No rotation pattern above threshold (best score {best_score:.3})")]
    PatternNotFound { best_score: f64 },

    #[error("District prediction unavailable: {0}")]
    PredictionUnavailable(String),

    #[error("Schema violation: {0}")]
    Schema(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ForecastError {
    /// Failures the core degrades from locally instead of surfacing.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ForecastError::ModelFit(_) => true,
            ForecastError::PatternNotFound { .. } => true,
            ForecastError::PredictionUnavailable(_) => true,
            ForecastError::InsufficientData { .. } => false,
            ForecastError::Schema(_) => false,
            ForecastError::Config(_) => false,
            _ => false,
        }
    }

    pub(crate) fn insufficient(what: &'static str, needed: usize, found: usize) -> Self {
        ForecastError::InsufficientData {
            what,
            needed,
            found,
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(ForecastError::ModelFit("no candidate".into()).is_recoverable());
        assert!(ForecastError::PatternNotFound { best_score: 0.4 }.is_recoverable());
        assert!(!ForecastError::insufficient("series", 2, 1).is_recoverable());
        assert!(!ForecastError::Schema("missing ServerId".into()).is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        let err = ForecastError::insufficient("time series buckets", 2, 1);
        assert_eq!(
            err.to_string(),
            "Insufficient data for time series buckets: need at least 2, found 1"
        );
    }
}
