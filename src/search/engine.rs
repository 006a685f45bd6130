//! Model search over one table
//!
//! The engine owns a cleaned copy of the input table, split into train and
//! test rows once at construction. `predict` tunes a strategy by grid search
//! on the training rows and evaluates the refit pipeline on both splits;
//! `dcv` instead estimates performance by nested cross-validation over the
//! whole table.

use super::config::SearchConfig;
use super::grid_search::GridSearch;
use super::pipeline::Pipeline;
use super::result::{ModelComparison, SearchResult};
use crate::error::{ExplorerError, Result};
use crate::selection::{FeatureSelectionEngine, ReductionMethod, StepLog};
use crate::strategy::{HyperParams, PipelineParams, PipelineStep, RegressionStrategy};
use crate::training::{train_test_split, KFold, RegressionMetrics};
use crate::utils::{
    column_to_array1, columns_to_array2, drop_incomplete_rows, feature_columns, require_columns,
    take_cols, take_elems, take_rows,
};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use std::time::Instant;
use tracing::{info, warn};

/// Train and test matrices after the hold-out split
#[derive(Debug, Clone)]
struct SplitData {
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_test: Array2<f64>,
    y_test: Array1<f64>,
}

/// Running sums of per-fold scores in a nested search
#[derive(Debug, Clone, Copy, Default)]
struct FoldTotals {
    train_r2: f64,
    train_mae: f64,
    train_mse: f64,
    test_r2: f64,
    test_mae: f64,
    test_mse: f64,
}

impl FoldTotals {
    fn add(&mut self, train: &RegressionMetrics, test: &RegressionMetrics) {
        self.train_r2 += train.r2;
        self.train_mae += train.mae;
        self.train_mse += train.mse;
        self.test_r2 += test.r2;
        self.test_mae += test.mae;
        self.test_mse += test.mse;
    }
}

/// Tunes and evaluates regression strategies on one table
#[derive(Debug, Clone)]
pub struct ModelSearchEngine {
    /// Strategy run by `predict` and `dcv`; unset for comparison runs
    strategy: Option<RegressionStrategy>,
    config: SearchConfig,
    /// Every clean row, used by nested search
    x: Array2<f64>,
    y: Array1<f64>,
    /// All feature columns of the table
    all_features: Vec<String>,
    /// Feature columns seen by the models, after optional reduction
    features: Vec<String>,
    split: SplitData,
    reduction_steps: Vec<StepLog>,
}

impl ModelSearchEngine {
    /// Prepare a search of `strategy` for `target`, using every other column
    /// as a feature
    pub fn new(
        df: &DataFrame,
        target: &str,
        strategy: RegressionStrategy,
        config: SearchConfig,
    ) -> Result<Self> {
        Self::with_excluded(df, target, &[], strategy, config)
    }

    /// As `new`, leaving the `excluded` columns out of modeling
    pub fn with_excluded(
        df: &DataFrame,
        target: &str,
        excluded: &[String],
        strategy: RegressionStrategy,
        config: SearchConfig,
    ) -> Result<Self> {
        Self::prepare(df, target, excluded, Some(strategy), config)
    }

    /// Split the table for `compare` without fixing a strategy
    pub fn for_comparison(
        df: &DataFrame,
        target: &str,
        excluded: &[String],
        config: SearchConfig,
    ) -> Result<Self> {
        Self::prepare(df, target, excluded, None, config)
    }

    fn prepare(
        df: &DataFrame,
        target: &str,
        excluded: &[String],
        strategy: Option<RegressionStrategy>,
        config: SearchConfig,
    ) -> Result<Self> {
        config.validate()?;
        require_columns(df, &[target.to_string()], "target")?;
        require_columns(df, excluded, "excluded")?;

        let all_features = feature_columns(df, target, excluded);
        if all_features.is_empty() {
            return Err(ExplorerError::NoFeaturesRemain {
                step: "input".to_string(),
            });
        }

        let mut numeric = all_features.clone();
        numeric.push(target.to_string());
        let clean = drop_incomplete_rows(df, &[], &numeric)?;
        if clean.height() == 0 {
            return Err(ExplorerError::InvalidInput(
                "no rows remain after dropping rows with missing values".to_string(),
            ));
        }

        let x = columns_to_array2(&clean, &all_features)?;
        let y = column_to_array1(&clean, target)?;

        let holdout = train_test_split(x.nrows(), config.test_size, config.split_seed)?;
        let mut split = SplitData {
            x_train: take_rows(&x, &holdout.train_indices),
            y_train: take_elems(&y, &holdout.train_indices),
            x_test: take_rows(&x, &holdout.test_indices),
            y_test: take_elems(&y, &holdout.test_indices),
        };

        let mut features = all_features.clone();
        let mut reduction_steps = Vec::new();
        if config.preprocessing {
            let selector =
                FeatureSelectionEngine::new(&[ReductionMethod::Variance, ReductionMethod::WrapperRelevance])
                    .with_config(config.selection.clone());
            let reduced = selector.reduce(&split.x_train, &features, &split.y_train)?;
            let kept: Vec<usize> = reduced
                .names
                .iter()
                .filter_map(|name| features.iter().position(|f| f == name))
                .collect();
            split.x_test = take_cols(&split.x_test, &kept);
            split.x_train = reduced.x;
            features = reduced.names;
            reduction_steps = reduced.steps;
        }

        info!(
            strategy = strategy.map_or("-", |s| s.name()),
            rows = x.nrows(),
            train = split.x_train.nrows(),
            test = split.x_test.nrows(),
            features = features.len(),
            "Prepared model search"
        );

        Ok(Self {
            strategy,
            config,
            x,
            y,
            all_features,
            features,
            split,
            reduction_steps,
        })
    }

    pub fn strategy(&self) -> Option<RegressionStrategy> {
        self.strategy
    }

    fn selected_strategy(&self) -> Result<RegressionStrategy> {
        self.strategy.ok_or_else(|| {
            ExplorerError::ConfigError(
                "no strategy selected; this engine was prepared for comparison only".to_string(),
            )
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Feature columns the models are trained on
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Columns removed by the pre-search reduction, if it ran
    pub fn reduction_steps(&self) -> &[StepLog] {
        &self.reduction_steps
    }

    pub fn n_train(&self) -> usize {
        self.split.x_train.nrows()
    }

    pub fn n_test(&self) -> usize {
        self.split.x_test.nrows()
    }

    /// Run `dcv` in nested mode and `predict` otherwise
    pub fn run(&self) -> Result<SearchResult> {
        if self.config.nested {
            self.dcv()
        } else {
            self.predict(None)
        }
    }

    /// Tune by grid search (unless `params` is given), refit on the training
    /// split and score both splits
    pub fn predict(&self, params: Option<&HyperParams>) -> Result<SearchResult> {
        self.evaluate(self.selected_strategy()?, params)
    }

    /// Nested cross-validation estimate over the whole table
    pub fn dcv(&self) -> Result<SearchResult> {
        self.nested(self.selected_strategy()?)
    }

    /// Run every strategy in turn, skipping those that fail
    pub fn compare(&self, strategies: &[RegressionStrategy]) -> Result<Vec<ModelComparison>> {
        let mut rows = Vec::with_capacity(strategies.len());
        let mut first_error: Option<ExplorerError> = None;
        for &strategy in strategies {
            let start = Instant::now();
            let outcome = if self.config.nested {
                self.nested(strategy)
            } else {
                self.evaluate(strategy, None)
            };
            match outcome {
                Ok(result) => {
                    let seconds = start.elapsed().as_secs_f64();
                    info!(strategy = strategy.name(), test_r2 = result.test_r2, seconds, "Strategy finished");
                    rows.push(ModelComparison::from_result(&result, seconds));
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "Strategy failed, skipping");
                    first_error.get_or_insert(e);
                }
            }
        }
        if rows.is_empty() {
            if let Some(e) = first_error {
                return Err(ExplorerError::FitFailure {
                    step: "compare".to_string(),
                    strategy: None,
                    reason: format!("every strategy failed; first error: {}", e),
                });
            }
        }
        Ok(rows)
    }

    fn evaluate(&self, strategy: RegressionStrategy, params: Option<&HyperParams>) -> Result<SearchResult> {
        let SplitData {
            x_train,
            y_train,
            x_test,
            y_test,
        } = &self.split;

        let chosen = match params {
            Some(params) => PipelineParams::from_model(params),
            None => {
                GridSearch::new(strategy, self.config.cv_folds, self.config.cv_seed)
                    .fit(x_train, y_train)?
                    .best_params
            }
        };

        let mut pipeline = Pipeline::new(strategy, &chosen)?;
        pipeline
            .fit(x_train, y_train)
            .map_err(|e| ExplorerError::fit_failure("refit", Some(strategy.name()), e))?;
        let y_predict_train = pipeline.predict(x_train)?;
        let y_predict = pipeline.predict(x_test)?;

        let train = RegressionMetrics::compute(y_train, &y_predict_train)?;
        let test = RegressionMetrics::compute(y_test, &y_predict)?;
        info!(
            strategy = strategy.name(),
            params = %chosen,
            train_r2 = train.r2,
            test_r2 = test.r2,
            "Evaluated on hold-out split"
        );

        Ok(SearchResult {
            strategy: strategy.name().to_string(),
            features: self.features.clone(),
            train_r2: train.r2,
            train_mae: train.mae,
            train_rmse: train.rmse,
            test_r2: test.r2,
            test_mae: test.mae,
            test_rmse: test.rmse,
            y_predict_train: Some(y_predict_train.to_vec()),
            y_train: Some(y_train.to_vec()),
            y_predict: Some(y_predict.to_vec()),
            y_test: Some(y_test.to_vec()),
            best_params: Some(chosen.for_step(PipelineStep::Model)),
        })
    }

    fn nested(&self, strategy: RegressionStrategy) -> Result<SearchResult> {
        let outer = KFold::new(self.config.outer_folds).split(self.x.nrows())?;
        let inner = GridSearch::new(strategy, self.config.cv_folds, self.config.cv_seed);

        let mut totals = FoldTotals::default();
        for fold in &outer {
            let step = format!("outer fold {}", fold.fold_idx + 1);
            let x_train = take_rows(&self.x, &fold.train_indices);
            let y_train = take_elems(&self.y, &fold.train_indices);
            let x_test = take_rows(&self.x, &fold.test_indices);
            let y_test = take_elems(&self.y, &fold.test_indices);

            let (train, test) = Self::score_outer_fold(&inner, strategy, &x_train, &y_train, &x_test, &y_test)
                .map_err(|e| ExplorerError::fit_failure(step.as_str(), Some(strategy.name()), e))?;

            info!(
                strategy = strategy.name(),
                fold = fold.fold_idx + 1,
                train_r2 = train.r2,
                test_r2 = test.r2,
                "Outer fold scored"
            );
            totals.add(&train, &test);
        }

        let k = outer.len() as f64;
        Ok(SearchResult {
            strategy: strategy.name().to_string(),
            features: self.all_features.clone(),
            train_r2: totals.train_r2 / k,
            train_mae: totals.train_mae / k,
            train_rmse: (totals.train_mse / k).sqrt(),
            test_r2: totals.test_r2 / k,
            test_mae: totals.test_mae / k,
            test_rmse: (totals.test_mse / k).sqrt(),
            y_predict_train: None,
            y_train: None,
            y_predict: None,
            y_test: None,
            best_params: None,
        })
    }

    /// Tune on the outer-train rows, refit and score both parts of the fold
    fn score_outer_fold(
        inner: &GridSearch,
        strategy: RegressionStrategy,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<(RegressionMetrics, RegressionMetrics)> {
        let best = inner.fit(x_train, y_train)?.best_params;
        let mut pipeline = Pipeline::new(strategy, &best)?;
        pipeline.fit(x_train, y_train)?;
        let train = RegressionMetrics::compute(y_train, &pipeline.predict(x_train)?)?;
        let test = RegressionMetrics::compute(y_test, &pipeline.predict(x_test)?)?;
        Ok((train, test))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ParamValue;
    use polars::prelude::*;

    fn linear_frame(n: usize) -> DataFrame {
        let a: Vec<f64> = (0..n).map(|i| (i % 13) as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64).collect();
        let c: Vec<f64> = (0..n).map(|i| ((i * 3) % 5) as f64 * 0.5).collect();
        let y: Vec<f64> = (0..n).map(|i| 3.0 * a[i] - 2.0 * b[i] + c[i] + 1.0).collect();
        df! {
            "a" => a,
            "b" => b,
            "c" => c,
            "y" => y,
        }
        .unwrap()
    }

    #[test]
    fn test_split_sizes() {
        let engine = ModelSearchEngine::new(
            &linear_frame(50),
            "y",
            RegressionStrategy::OrdinaryLeastSquares,
            SearchConfig::default(),
        )
        .unwrap();
        assert_eq!(engine.n_test(), 10);
        assert_eq!(engine.n_train(), 40);
        assert_eq!(engine.features(), &["a", "b", "c"]);
    }

    #[test]
    fn test_ols_predict_is_exact_on_noiseless_data() {
        let engine = ModelSearchEngine::new(
            &linear_frame(50),
            "y",
            RegressionStrategy::OrdinaryLeastSquares,
            SearchConfig::default(),
        )
        .unwrap();
        let result = engine.predict(None).unwrap();
        assert!(result.test_r2 > 0.999);
        assert!(result.test_rmse < 1e-6);
        assert_eq!(result.y_predict.as_ref().unwrap().len(), 10);
        assert!(result.best_params.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_supplied_params_skip_search() {
        let engine = ModelSearchEngine::new(
            &linear_frame(50),
            "y",
            RegressionStrategy::Ridge,
            SearchConfig::default(),
        )
        .unwrap();
        let mut params = HyperParams::new();
        params.insert("alpha".to_string(), ParamValue::Float(0.25));
        let result = engine.predict(Some(&params)).unwrap();
        assert_eq!(result.best_params.unwrap()["alpha"], ParamValue::Float(0.25));
    }

    #[test]
    fn test_excluded_columns_are_not_features() {
        let engine = ModelSearchEngine::with_excluded(
            &linear_frame(30),
            "y",
            &["c".to_string()],
            RegressionStrategy::OrdinaryLeastSquares,
            SearchConfig::default(),
        )
        .unwrap();
        assert_eq!(engine.features(), &["a", "b"]);
    }

    #[test]
    fn test_dcv_reports_aggregates_only() {
        let engine = ModelSearchEngine::new(
            &linear_frame(50),
            "y",
            RegressionStrategy::OrdinaryLeastSquares,
            SearchConfig::default().with_nested(true),
        )
        .unwrap();
        let result = engine.run().unwrap();
        assert!(result.is_nested());
        assert!(result.best_params.is_none());
        assert!(result.test_r2 > 0.999);
    }

    #[test]
    fn test_missing_target_is_invalid_input() {
        let err = ModelSearchEngine::new(
            &linear_frame(20),
            "missing",
            RegressionStrategy::OrdinaryLeastSquares,
            SearchConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ExplorerError::InvalidInput(_)));
    }

    #[test]
    fn test_nested_with_preprocessing_rejected() {
        let config = SearchConfig::default().with_nested(true).with_preprocessing(true);
        let err = ModelSearchEngine::new(
            &linear_frame(20),
            "y",
            RegressionStrategy::OrdinaryLeastSquares,
            config,
        )
        .unwrap_err();
        assert!(matches!(err, ExplorerError::ConfigError(_)));
    }

    #[test]
    fn test_compare_collects_rows() {
        let engine = ModelSearchEngine::new(
            &linear_frame(40),
            "y",
            RegressionStrategy::OrdinaryLeastSquares,
            SearchConfig::default(),
        )
        .unwrap();
        let rows = engine
            .compare(&[RegressionStrategy::OrdinaryLeastSquares, RegressionStrategy::DecisionTree])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].model, "OLS");
        assert_eq!(rows[1].model, "DT");
        assert!(rows[0].seconds >= 0.0);
    }

    #[test]
    fn test_compare_skips_failing_strategy() {
        let n = 40;
        let a: Vec<f64> = (0..n).map(|i| (i % 13) as f64).collect();
        let y: Vec<f64> = a.iter().map(|v| 2.0 * v + 1.0).collect();
        // An infinite column breaks every scaled linear fit; trees split on `a`
        let df = df! {
            "a" => a,
            "inf" => vec![f64::INFINITY; n],
            "y" => y,
        }
        .unwrap();

        let engine = ModelSearchEngine::for_comparison(&df, "y", &[], SearchConfig::default()).unwrap();
        let rows = engine
            .compare(&[RegressionStrategy::OrdinaryLeastSquares, RegressionStrategy::DecisionTree])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].model, "DT");
    }

    #[test]
    fn test_compare_all_failing_keeps_first_cause() {
        // 6 rows leave 4 for training, too few for 5-fold search
        let engine = ModelSearchEngine::for_comparison(&linear_frame(6), "y", &[], SearchConfig::default()).unwrap();
        let err = engine
            .compare(&[RegressionStrategy::OrdinaryLeastSquares, RegressionStrategy::Ridge])
            .unwrap_err();
        match err {
            ExplorerError::FitFailure { step, strategy, reason } => {
                assert_eq!(step, "compare");
                assert!(strategy.is_none());
                assert!(reason.contains("n_samples (4)"), "{}", reason);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_comparison_engine_has_no_strategy() {
        let engine = ModelSearchEngine::for_comparison(&linear_frame(30), "y", &[], SearchConfig::default()).unwrap();
        assert!(engine.strategy().is_none());
        assert!(matches!(engine.predict(None), Err(ExplorerError::ConfigError(_))));
        assert!(matches!(engine.dcv(), Err(ExplorerError::ConfigError(_))));
    }
}
