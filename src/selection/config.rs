//! Feature selection configuration

use crate::error::{ExplorerError, Result};
use serde::{Deserialize, Serialize};

/// Variance below which a column counts as near-constant: the variance of a
/// Bernoulli variable with p = 0.8
pub const BERNOULLI_VARIANCE_THRESHOLD: f64 = 0.8 * (1.0 - 0.8);

/// Absolute Pearson correlation at which two columns count as redundant
pub const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.95;

/// Number of trees in each Boruta forest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorutaEstimators {
    /// Scale with the number of features still in play
    Auto,
    Fixed(usize),
}

/// Boruta (shadow-feature relevance test) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorutaConfig {
    /// Iteration cap
    pub max_iter: usize,
    /// Significance level
    pub alpha: f64,
    /// Percentile of shadow importances a feature must beat to score a hit
    pub perc: f64,
    /// Depth of the forest's trees
    pub max_depth: usize,
    pub n_estimators: BorutaEstimators,
    pub random_state: u64,
    /// Apply a Bonferroni-style `alpha / iter` check on top of FDR correction
    pub two_step: bool,
}

impl Default for BorutaConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            alpha: 0.05,
            perc: 70.0,
            max_depth: 5,
            n_estimators: BorutaEstimators::Auto,
            random_state: 42,
            two_step: true,
        }
    }
}

impl BorutaConfig {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_perc(mut self, perc: f64) -> Self {
        self.perc = perc;
        self
    }

    pub fn with_n_estimators(mut self, n_estimators: BorutaEstimators) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ExplorerError::ConfigError(format!(
                "boruta alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if !(self.perc > 0.0 && self.perc <= 100.0) {
            return Err(ExplorerError::ConfigError(format!(
                "boruta perc must be in (0, 100], got {}",
                self.perc
            )));
        }
        if self.max_iter < 2 {
            return Err(ExplorerError::ConfigError(
                "boruta max_iter must be at least 2".to_string(),
            ));
        }
        if self.max_depth == 0 || self.n_estimators == BorutaEstimators::Fixed(0) {
            return Err(ExplorerError::ConfigError(
                "boruta forest needs a positive depth and tree count".to_string(),
            ));
        }
        Ok(())
    }
}

/// Thresholds and settings for the three reduction methods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    pub variance_threshold: f64,
    pub correlation_threshold: f64,
    pub boruta: BorutaConfig,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            variance_threshold: BERNOULLI_VARIANCE_THRESHOLD,
            correlation_threshold: DEFAULT_CORRELATION_THRESHOLD,
            boruta: BorutaConfig::default(),
        }
    }
}

impl SelectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variance_threshold(mut self, threshold: f64) -> Self {
        self.variance_threshold = threshold;
        self
    }

    pub fn with_correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = threshold;
        self
    }

    pub fn with_boruta(mut self, boruta: BorutaConfig) -> Self {
        self.boruta = boruta;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.variance_threshold >= 0.0) {
            return Err(ExplorerError::ConfigError(format!(
                "variance threshold must be non-negative, got {}",
                self.variance_threshold
            )));
        }
        if !(self.correlation_threshold > 0.0 && self.correlation_threshold <= 1.0) {
            return Err(ExplorerError::ConfigError(format!(
                "correlation threshold must be in (0, 1], got {}",
                self.correlation_threshold
            )));
        }
        self.boruta.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SelectionConfig::default();
        assert!((config.variance_threshold - 0.16).abs() < 1e-12);
        assert_eq!(config.correlation_threshold, 0.95);
        assert_eq!(config.boruta.max_iter, 100);
        assert_eq!(config.boruta.perc, 70.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SelectionConfig::new().with_correlation_threshold(0.0).validate().is_err());
        assert!(SelectionConfig::new().with_variance_threshold(-1.0).validate().is_err());
        let boruta = BorutaConfig::default().with_perc(120.0);
        assert!(SelectionConfig::new().with_boruta(boruta).validate().is_err());
    }

    #[test]
    fn test_config_json() {
        let config: SelectionConfig = serde_json::from_str(
            r#"{"variance_threshold": 0.1, "correlation_threshold": 0.9,
                "boruta": {"max_iter": 20, "alpha": 0.05, "perc": 80.0, "max_depth": 5,
                           "n_estimators": {"fixed": 50}, "random_state": 1, "two_step": false}}"#,
        )
        .unwrap();
        assert_eq!(config.boruta.n_estimators, BorutaEstimators::Fixed(50));
        assert!(!config.boruta.two_step);
    }
}
