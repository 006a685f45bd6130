//! Regression Explorer - exploratory regression modeling on tabular data
//!
//! This crate provides:
//! - Feature reduction: near-constant column removal, correlation pruning
//!   and Boruta relevance selection
//! - A catalog of fourteen regression strategies with hyperparameter grids
//! - Grid search under k-fold cross-validation, hold-out evaluation and
//!   nested cross-validation
//!
//! # Modules
//!
//! - [`selection`] - Feature reduction over a table
//! - [`strategy`] - Regression strategy catalog and hyperparameter grids
//! - [`search`] - Model search, evaluation and comparison
//! - [`training`] - Regressors, metrics and cross-validation splitters
//! - [`preprocessing`] - Standardization
//! - [`utils`] - CSV loading and column extraction
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod preprocessing;
pub mod utils;

// Modeling
pub mod training;
pub mod strategy;

// Exploration
pub mod selection;
pub mod search;

// Services
pub mod cli;

pub use error::{ExplorerError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ExplorerError, Result};

    // Data
    pub use crate::utils::{DataLoader, DataSaver};

    // Feature selection
    pub use crate::selection::{FeatureSelectionEngine, ReductionMethod, SelectionConfig, SelectionOutcome};

    // Strategies
    pub use crate::strategy::{HyperParams, ParamValue, RegressionStrategy};

    // Search
    pub use crate::search::{ModelComparison, ModelSearchEngine, SearchConfig, SearchResult};

    // Training
    pub use crate::training::{RegressionMetrics, Regressor};
}
