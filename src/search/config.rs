//! Model search configuration

use crate::error::{ExplorerError, Result};
use crate::selection::SelectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Split, cross-validation and mode settings for a model search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Fraction of rows held out for testing
    pub test_size: f64,
    pub split_seed: u64,
    /// Folds of the inner (hyperparameter) cross-validation
    pub cv_folds: usize,
    pub cv_seed: u64,
    /// Folds of the outer loop in nested mode
    pub outer_folds: usize,
    /// Estimate performance by nested cross-validation
    pub nested: bool,
    /// Reduce features (variance, then Boruta) on the training split first
    pub preprocessing: bool,
    /// Thresholds used when `preprocessing` is set
    pub selection: SelectionConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            split_seed: 42,
            cv_folds: 5,
            cv_seed: 0,
            outer_folds: 5,
            nested: false,
            preprocessing: false,
            selection: SelectionConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    pub fn with_preprocessing(mut self, preprocessing: bool) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_outer_folds(mut self, folds: usize) -> Self {
        self.outer_folds = folds;
        self
    }

    pub fn with_selection(mut self, selection: SelectionConfig) -> Self {
        self.selection = selection;
        self
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: SearchConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.nested && self.preprocessing {
            return Err(ExplorerError::ConfigError(
                "nested cross-validation cannot be combined with feature preprocessing".to_string(),
            ));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ExplorerError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.cv_folds < 2 || self.outer_folds < 2 {
            return Err(ExplorerError::ConfigError(format!(
                "cross-validation needs at least 2 folds, got cv_folds={} outer_folds={}",
                self.cv_folds, self.outer_folds
            )));
        }
        if self.preprocessing {
            self.selection.validate()?;
        }
        Ok(())
    }
}
