//! Feature reduction
//!
//! Three methods run in a fixed order over the working column set:
//! near-constant column removal, greedy pruning of correlated columns and
//! Boruta relevance selection. Hidden columns never take part and are
//! reattached to the output unchanged.

mod boruta;
mod config;
mod correlation;
mod variance;

pub use boruta::{Boruta, BorutaReport, FeatureDecision};
pub use config::{
    BorutaConfig, BorutaEstimators, SelectionConfig, BERNOULLI_VARIANCE_THRESHOLD,
    DEFAULT_CORRELATION_THRESHOLD,
};
pub use correlation::{abs_correlation_matrix, CorrelationPruner};
pub use variance::VarianceFilter;

use crate::error::{ExplorerError, Result};
use crate::utils::{
    column_to_array1, columns_to_array2, drop_incomplete_rows, feature_columns, require_columns,
    take_cols,
};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// A feature reduction method. Declaration order is application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReductionMethod {
    Variance,
    Correlation,
    WrapperRelevance,
}

impl ReductionMethod {
    pub fn all() -> [ReductionMethod; 3] {
        [
            ReductionMethod::Variance,
            ReductionMethod::Correlation,
            ReductionMethod::WrapperRelevance,
        ]
    }

    /// Short key used on the command line and in logs
    pub fn key(&self) -> &'static str {
        match self {
            ReductionMethod::Variance => "variance",
            ReductionMethod::Correlation => "correlation",
            ReductionMethod::WrapperRelevance => "boruta",
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            ReductionMethod::Variance => "Variance",
            ReductionMethod::Correlation => "Correlation (drop near-duplicate columns)",
            ReductionMethod::WrapperRelevance => "Boruta (slow)",
        }
    }

    /// Parse a key, a display label or one of the aliases, ignoring case
    pub fn from_label(label: &str) -> Result<Self> {
        let wanted = label.trim().to_ascii_lowercase();
        let alias = match wanted.as_str() {
            "corr" => Some(ReductionMethod::Correlation),
            "wrapper-relevance" | "wrapper_relevance" | "relevance" => {
                Some(ReductionMethod::WrapperRelevance)
            }
            _ => None,
        };
        alias
            .or_else(|| {
                Self::all()
                    .into_iter()
                    .find(|m| m.key() == wanted || m.label().to_ascii_lowercase() == wanted)
            })
            .ok_or_else(|| {
                ExplorerError::InvalidInput(format!(
                    "unknown reduction method '{}'; expected variance, correlation or boruta",
                    label
                ))
            })
    }
}

impl fmt::Display for ReductionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ReductionMethod {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_label(s)
    }
}

/// Columns removed by one reduction step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLog {
    pub method: ReductionMethod,
    pub removed: Vec<String>,
}

/// Reduction applied to an extracted feature matrix
#[derive(Debug, Clone)]
pub struct ReducedFeatures {
    pub x: Array2<f64>,
    pub names: Vec<String>,
    pub steps: Vec<StepLog>,
    pub boruta: Option<BorutaReport>,
}

/// Result of selecting over a table
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    /// Hidden columns, then kept features, then the target
    pub frame: DataFrame,
    pub features: Vec<String>,
    pub steps: Vec<StepLog>,
    pub boruta: Option<BorutaReport>,
    /// Rows dropped for missing values
    pub dropped_rows: usize,
}

/// Applies the chosen reduction methods in their fixed order
#[derive(Debug, Clone)]
pub struct FeatureSelectionEngine {
    config: SelectionConfig,
    methods: Vec<ReductionMethod>,
}

impl FeatureSelectionEngine {
    /// Engine running `methods`; duplicates are ignored and the order is fixed
    pub fn new(methods: &[ReductionMethod]) -> Self {
        let mut methods = methods.to_vec();
        methods.sort();
        methods.dedup();
        Self {
            config: SelectionConfig::default(),
            methods,
        }
    }

    pub fn with_config(mut self, config: SelectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn methods(&self) -> &[ReductionMethod] {
        &self.methods
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Select features of `df` against `target`, carrying `hidden` through
    pub fn select(&self, df: &DataFrame, target: &str, hidden: &[String]) -> Result<SelectionOutcome> {
        self.config.validate()?;
        require_columns(df, &[target.to_string()], "target")?;
        require_columns(df, hidden, "hidden")?;
        if hidden.iter().any(|h| h == target) {
            return Err(ExplorerError::InvalidInput(format!(
                "target column '{}' cannot also be hidden",
                target
            )));
        }

        let features = feature_columns(df, target, hidden);
        if features.is_empty() {
            return Err(ExplorerError::NoFeaturesRemain {
                step: "input".to_string(),
            });
        }

        let mut numeric = features.clone();
        numeric.push(target.to_string());
        let clean = drop_incomplete_rows(df, hidden, &numeric)?;
        if clean.height() == 0 {
            return Err(ExplorerError::InvalidInput(
                "no rows remain after dropping rows with missing values".to_string(),
            ));
        }

        let x = columns_to_array2(&clean, &features)?;
        let y = column_to_array1(&clean, target)?;
        let reduced = self.reduce(&x, &features, &y)?;

        let mut order: Vec<String> = hidden.to_vec();
        order.extend(reduced.names.iter().cloned());
        order.push(target.to_string());
        let frame = clean.select(order)?;

        Ok(SelectionOutcome {
            frame,
            features: reduced.names,
            steps: reduced.steps,
            boruta: reduced.boruta,
            dropped_rows: df.height() - clean.height(),
        })
    }

    /// Run the reduction on an extracted matrix whose columns are `names`
    pub fn reduce(&self, x: &Array2<f64>, names: &[String], y: &Array1<f64>) -> Result<ReducedFeatures> {
        if names.len() != x.ncols() {
            return Err(ExplorerError::ShapeError {
                expected: format!("{} column names", x.ncols()),
                actual: format!("{} column names", names.len()),
            });
        }

        let mut x = x.to_owned();
        let mut names = names.to_vec();
        let mut steps = Vec::with_capacity(self.methods.len());
        let mut boruta_report = None;

        for &method in &self.methods {
            if names.is_empty() {
                return Err(ExplorerError::NoFeaturesRemain {
                    step: method.key().to_string(),
                });
            }

            let kept = match method {
                ReductionMethod::Variance => VarianceFilter::new(self.config.variance_threshold).select(&x),
                ReductionMethod::Correlation => {
                    CorrelationPruner::new(self.config.correlation_threshold).select(&x)
                }
                ReductionMethod::WrapperRelevance => {
                    let report = Boruta::new(self.config.boruta.clone()).fit(&x, y)?;
                    let confirmed = report.confirmed();
                    boruta_report = Some(report);
                    confirmed
                }
            };

            let removed: Vec<String> = names
                .iter()
                .enumerate()
                .filter(|(i, _)| !kept.contains(i))
                .map(|(_, n)| n.clone())
                .collect();
            info!(
                method = method.key(),
                removed = removed.len(),
                remaining = kept.len(),
                "Reduction step finished"
            );

            if kept.is_empty() {
                return Err(ExplorerError::NoFeaturesRemain {
                    step: method.key().to_string(),
                });
            }

            x = take_cols(&x, &kept);
            names = kept.iter().map(|&i| names[i].clone()).collect();
            steps.push(StepLog { method, removed });
        }

        Ok(ReducedFeatures {
            x,
            names,
            steps,
            boruta: boruta_report,
        })
    }
}
