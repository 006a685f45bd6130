//! Error types for regression exploration

use thiserror::Error;

/// Result type alias for explorer operations
pub type Result<T> = std::result::Result<T, ExplorerError>;

/// Main error type for feature selection and model search
#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No features remain after {step}")]
    NoFeaturesRemain { step: String },

    #[error("Fit failed during {step}{}: {reason}", strategy_suffix(.strategy))]
    FitFailure {
        step: String,
        strategy: Option<String>,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn strategy_suffix(strategy: &Option<String>) -> String {
    strategy.as_ref().map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl ExplorerError {
    /// Wrap a lower-level error as a fit failure attributed to `step`
    pub fn fit_failure(step: impl Into<String>, strategy: Option<&str>, err: ExplorerError) -> Self {
        match err {
            // Already attributed further down; keep the innermost context
            ExplorerError::FitFailure { .. } => err,
            other => ExplorerError::FitFailure {
                step: step.into(),
                strategy: strategy.map(str::to_string),
                reason: other.to_string(),
            },
        }
    }

    /// Row-count mismatch between `X` and `y`
    pub fn sample_mismatch(n_samples: usize, y_len: usize) -> Self {
        ExplorerError::ShapeError {
            expected: format!("y length = {}", n_samples),
            actual: format!("y length = {}", y_len),
        }
    }
}

impl From<polars::error::PolarsError> for ExplorerError {
    fn from(err: polars::error::PolarsError) -> Self {
        ExplorerError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for ExplorerError {
    fn from(err: serde_json::Error) -> Self {
        ExplorerError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ExplorerError {
    fn from(err: ndarray::ShapeError) -> Self {
        ExplorerError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExplorerError::InvalidInput("target column 'y' not found".to_string());
        assert_eq!(err.to_string(), "Invalid input: target column 'y' not found");
    }

    #[test]
    fn test_fit_failure_display() {
        let err = ExplorerError::FitFailure {
            step: "refit".to_string(),
            strategy: Some("PLS".to_string()),
            reason: "singular matrix".to_string(),
        };
        assert_eq!(err.to_string(), "Fit failed during refit (PLS): singular matrix");

        let err = ExplorerError::FitFailure {
            step: "boruta".to_string(),
            strategy: None,
            reason: "empty".to_string(),
        };
        assert_eq!(err.to_string(), "Fit failed during boruta: empty");
    }

    #[test]
    fn test_fit_failure_keeps_inner_context() {
        let inner = ExplorerError::FitFailure {
            step: "outer fold 2".to_string(),
            strategy: Some("Ridge".to_string()),
            reason: "x".to_string(),
        };
        let wrapped = ExplorerError::fit_failure("nested cv", Some("Ridge"), inner);
        assert!(matches!(wrapped, ExplorerError::FitFailure { ref step, .. } if step == "outer fold 2"));

        let wrapped = ExplorerError::fit_failure("refit", Some("OLS"), ExplorerError::ModelNotFitted);
        assert!(matches!(wrapped, ExplorerError::FitFailure { ref reason, .. } if reason == "Model not fitted"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ExplorerError = io_err.into();
        assert!(matches!(err, ExplorerError::Io(_)));
    }
}
