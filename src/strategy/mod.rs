//! Regression strategy catalog
//!
//! Fourteen named strategies, each declaring whether its inputs are
//! standardized before fitting, the grid its hyperparameters are searched
//! over, and how to construct the regressor from a set of overrides.

mod params;

pub use params::{HyperParams, ParamGrid, ParamKey, ParamValue, PipelineParams, PipelineStep};

use crate::error::{ExplorerError, Result};
use crate::training::{
    CovarianceType, DecisionTree, ElasticNetRegression, GaussianMixtureRegressor,
    GradientBoostingConfig, GradientBoostingRegressor, LassoRegression, LightGBMConfig,
    LightGBMRegressor, LinearRegression, LocallyWeightedPLS, MaxFeatures, PLSRegression,
    RandomForest, Regressor, RidgeRegression, SVMConfig, SVMRegressor, XGBoostConfig, XGBoostRegressor,
};
use params::{float_param, floats, fractions, int_range, ints, powers_of_two, str_param, usize_param};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Built-in regression strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegressionStrategy {
    OrdinaryLeastSquares,
    PartialLeastSquares,
    LocallyWeightedPls,
    Ridge,
    Lasso,
    ElasticNet,
    LinearSvr,
    NonlinearSvr,
    DecisionTree,
    RandomForest,
    GradientBoosting,
    XGBoost,
    LightGBM,
    GaussianMixture,
}

const ALL_STRATEGIES: [RegressionStrategy; 14] = [
    RegressionStrategy::OrdinaryLeastSquares,
    RegressionStrategy::PartialLeastSquares,
    RegressionStrategy::LocallyWeightedPls,
    RegressionStrategy::Ridge,
    RegressionStrategy::Lasso,
    RegressionStrategy::ElasticNet,
    RegressionStrategy::LinearSvr,
    RegressionStrategy::NonlinearSvr,
    RegressionStrategy::DecisionTree,
    RegressionStrategy::RandomForest,
    RegressionStrategy::GradientBoosting,
    RegressionStrategy::XGBoost,
    RegressionStrategy::LightGBM,
    RegressionStrategy::GaussianMixture,
];

const BOOSTER_PARAMS: [&str; 11] = [
    "n_estimators",
    "learning_rate",
    "max_depth",
    "min_child_weight",
    "min_child_samples",
    "reg_lambda",
    "reg_alpha",
    "gamma",
    "subsample",
    "subsample_freq",
    "colsample_bytree",
];

impl RegressionStrategy {
    /// Every strategy in display order
    pub fn all() -> &'static [RegressionStrategy] {
        &ALL_STRATEGIES
    }

    /// Display names in catalog order
    pub fn names() -> Vec<&'static str> {
        ALL_STRATEGIES.iter().map(|s| s.name()).collect()
    }

    /// Short display name
    pub fn name(&self) -> &'static str {
        match self {
            RegressionStrategy::OrdinaryLeastSquares => "OLS",
            RegressionStrategy::PartialLeastSquares => "PLS",
            RegressionStrategy::LocallyWeightedPls => "LWPLS",
            RegressionStrategy::Ridge => "Ridge",
            RegressionStrategy::Lasso => "Lasso",
            RegressionStrategy::ElasticNet => "EN",
            RegressionStrategy::LinearSvr => "LSVR",
            RegressionStrategy::NonlinearSvr => "NSVR",
            RegressionStrategy::DecisionTree => "DT",
            RegressionStrategy::RandomForest => "RF",
            RegressionStrategy::GradientBoosting => "GBDT",
            RegressionStrategy::XGBoost => "XGB",
            RegressionStrategy::LightGBM => "LGB",
            RegressionStrategy::GaussianMixture => "GMR",
        }
    }

    /// Snake-case long name
    pub fn long_name(&self) -> &'static str {
        match self {
            RegressionStrategy::OrdinaryLeastSquares => "ordinary_least_squares",
            RegressionStrategy::PartialLeastSquares => "partial_least_squares",
            RegressionStrategy::LocallyWeightedPls => "locally_weighted_pls",
            RegressionStrategy::Ridge => "ridge",
            RegressionStrategy::Lasso => "lasso",
            RegressionStrategy::ElasticNet => "elastic_net",
            RegressionStrategy::LinearSvr => "linear_svr",
            RegressionStrategy::NonlinearSvr => "nonlinear_svr",
            RegressionStrategy::DecisionTree => "decision_tree",
            RegressionStrategy::RandomForest => "random_forest",
            RegressionStrategy::GradientBoosting => "gradient_boosting",
            RegressionStrategy::XGBoost => "xgboost",
            RegressionStrategy::LightGBM => "lightgbm",
            RegressionStrategy::GaussianMixture => "gaussian_mixture",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RegressionStrategy::OrdinaryLeastSquares => "Ordinary least squares",
            RegressionStrategy::PartialLeastSquares => "Partial least squares (NIPALS)",
            RegressionStrategy::LocallyWeightedPls => "Locally weighted partial least squares",
            RegressionStrategy::Ridge => "Ridge regression (L2)",
            RegressionStrategy::Lasso => "Lasso regression (L1)",
            RegressionStrategy::ElasticNet => "Elastic net (L1 + L2)",
            RegressionStrategy::LinearSvr => "Linear support vector regression",
            RegressionStrategy::NonlinearSvr => "RBF-kernel support vector regression",
            RegressionStrategy::DecisionTree => "Regression tree",
            RegressionStrategy::RandomForest => "Random forest",
            RegressionStrategy::GradientBoosting => "Gradient boosted trees",
            RegressionStrategy::XGBoost => "XGBoost-style boosting (depth-wise)",
            RegressionStrategy::LightGBM => "LightGBM-style boosting (leaf-wise)",
            RegressionStrategy::GaussianMixture => "Gaussian mixture regression",
        }
    }

    /// Look up a strategy by short or long name, ignoring case
    pub fn from_name(name: &str) -> Result<Self> {
        let wanted = name.trim();
        ALL_STRATEGIES
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(wanted) || s.long_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ExplorerError::InvalidInput(format!(
                    "unknown strategy '{}'; expected one of {}",
                    name,
                    Self::names().join(", ")
                ))
            })
    }

    /// Tree ensembles are invariant to monotonic rescaling of the features
    pub fn requires_scaling(&self) -> bool {
        !matches!(
            self,
            RegressionStrategy::DecisionTree
                | RegressionStrategy::RandomForest
                | RegressionStrategy::GradientBoosting
                | RegressionStrategy::XGBoost
                | RegressionStrategy::LightGBM
        )
    }

    /// Hyperparameter names `construct` understands
    pub fn accepted_params(&self) -> &'static [&'static str] {
        match self {
            RegressionStrategy::OrdinaryLeastSquares => &[],
            RegressionStrategy::PartialLeastSquares => &["n_components", "max_iter"],
            RegressionStrategy::LocallyWeightedPls => &["n_components", "lambda_in_similarity"],
            RegressionStrategy::Ridge => &["alpha"],
            RegressionStrategy::Lasso => &["alpha", "max_iter"],
            RegressionStrategy::ElasticNet => &["alpha", "l1_ratio", "max_iter"],
            RegressionStrategy::LinearSvr => &["C", "epsilon", "max_iter"],
            RegressionStrategy::NonlinearSvr => &["C", "epsilon", "gamma", "max_iter"],
            RegressionStrategy::DecisionTree => &["max_depth", "min_samples_leaf", "min_samples_split"],
            RegressionStrategy::RandomForest => &["n_estimators", "max_features", "max_depth", "min_samples_leaf"],
            RegressionStrategy::GradientBoosting => &[
                "n_estimators",
                "max_features",
                "learning_rate",
                "max_depth",
                "min_samples_leaf",
                "subsample",
            ],
            RegressionStrategy::XGBoost => &BOOSTER_PARAMS,
            RegressionStrategy::LightGBM => &[
                "n_estimators",
                "learning_rate",
                "num_leaves",
                "max_depth",
                "min_child_weight",
                "min_child_samples",
                "reg_lambda",
                "reg_alpha",
                "subsample",
                "subsample_freq",
                "colsample_bytree",
            ],
            RegressionStrategy::GaussianMixture => &["n_components", "covariance_type", "max_iter"],
        }
    }

    /// Search space, keyed under the model step of the pipeline
    pub fn param_grid(&self) -> ParamGrid {
        let grid = ParamGrid::new();
        match self {
            RegressionStrategy::OrdinaryLeastSquares => grid,
            RegressionStrategy::PartialLeastSquares => grid
                .with_model_param("n_components", int_range(5, 30))
                .with_model_param("max_iter", ints(&[1000, 2000])),
            RegressionStrategy::LocallyWeightedPls => grid
                .with_model_param("n_components", int_range(5, 30))
                .with_model_param("lambda_in_similarity", powers_of_two(-9, 5)),
            RegressionStrategy::Ridge => grid.with_model_param("alpha", powers_of_two(-15, 9)),
            RegressionStrategy::Lasso => grid.with_model_param("alpha", powers_of_two(-15, -1)),
            RegressionStrategy::ElasticNet => grid
                .with_model_param("alpha", powers_of_two(-15, -1))
                .with_model_param("l1_ratio", fractions(1, 100, 100)),
            RegressionStrategy::LinearSvr => grid
                .with_model_param("epsilon", powers_of_two(-10, -1))
                .with_model_param("C", powers_of_two(-5, 4)),
            RegressionStrategy::NonlinearSvr => grid
                .with_model_param("C", powers_of_two(-5, 9))
                .with_model_param("epsilon", powers_of_two(-10, -1))
                .with_model_param("gamma", powers_of_two(-20, 10)),
            RegressionStrategy::DecisionTree => grid
                .with_model_param("max_depth", int_range(2, 30))
                .with_model_param("min_samples_leaf", ints(&[3])),
            RegressionStrategy::RandomForest | RegressionStrategy::GradientBoosting => grid
                .with_model_param("n_estimators", ints(&[500]))
                .with_model_param("max_features", fractions(1, 10, 10)),
            RegressionStrategy::XGBoost => booster_grid(grid),
            RegressionStrategy::LightGBM => booster_grid(grid)
                .with_model_param("reg_lambda", floats(&[0.0001, 0.1]))
                .with_model_param("num_leaves", ints(&[2, 3, 4, 6])),
            RegressionStrategy::GaussianMixture => grid
                .with_model_param("n_components", int_range(1, 30))
                .with_model_param(
                    "covariance_type",
                    ["full", "tied", "diag", "spherical"].into_iter().map(ParamValue::from).collect(),
                ),
        }
    }

    /// Regressor defaults for every parameter that has a plain value
    pub fn default_params(&self) -> HyperParams {
        let entries: Vec<(&str, ParamValue)> = match self {
            RegressionStrategy::OrdinaryLeastSquares => vec![],
            RegressionStrategy::PartialLeastSquares => {
                let d = PLSRegression::default();
                vec![("n_components", d.n_components.into()), ("max_iter", d.max_iter.into())]
            }
            RegressionStrategy::LocallyWeightedPls => {
                let d = LocallyWeightedPLS::default();
                vec![
                    ("n_components", d.n_components.into()),
                    ("lambda_in_similarity", d.lambda_in_similarity.into()),
                ]
            }
            RegressionStrategy::Ridge => vec![("alpha", RidgeRegression::default().alpha.into())],
            RegressionStrategy::Lasso => {
                let d = LassoRegression::default();
                vec![("alpha", d.alpha.into()), ("max_iter", d.max_iter.into())]
            }
            RegressionStrategy::ElasticNet => {
                let d = ElasticNetRegression::default();
                vec![
                    ("alpha", d.alpha.into()),
                    ("l1_ratio", d.l1_ratio.into()),
                    ("max_iter", d.max_iter.into()),
                ]
            }
            RegressionStrategy::LinearSvr => {
                let d = SVMRegressor::linear(1.0, 0.0);
                vec![
                    ("C", d.config().c.into()),
                    ("epsilon", d.config().epsilon.into()),
                    ("max_iter", d.config().max_iter.into()),
                ]
            }
            RegressionStrategy::NonlinearSvr => {
                let d = SVMRegressor::rbf(1.0, 0.1, 1.0);
                vec![
                    ("C", d.config().c.into()),
                    ("epsilon", d.config().epsilon.into()),
                    ("gamma", 1.0.into()),
                    ("max_iter", d.config().max_iter.into()),
                ]
            }
            RegressionStrategy::DecisionTree => {
                let d = DecisionTree::new_regressor();
                vec![
                    ("min_samples_leaf", d.min_samples_leaf.into()),
                    ("min_samples_split", d.min_samples_split.into()),
                ]
            }
            RegressionStrategy::RandomForest => {
                let d = RandomForest::default();
                vec![
                    ("n_estimators", d.n_estimators.into()),
                    ("max_features", 1.0.into()),
                    ("min_samples_leaf", d.min_samples_leaf.into()),
                ]
            }
            RegressionStrategy::GradientBoosting => {
                let d = GradientBoostingConfig::default();
                vec![
                    ("n_estimators", d.n_estimators.into()),
                    ("max_features", 1.0.into()),
                    ("learning_rate", d.learning_rate.into()),
                    ("max_depth", d.max_depth.into()),
                    ("min_samples_leaf", d.min_samples_leaf.into()),
                    ("subsample", d.subsample.into()),
                ]
            }
            RegressionStrategy::XGBoost => {
                let d = XGBoostConfig::default();
                vec![
                    ("n_estimators", d.n_estimators.into()),
                    ("learning_rate", d.learning_rate.into()),
                    ("max_depth", d.max_depth.into()),
                    ("min_child_weight", d.min_child_weight.into()),
                    ("min_child_samples", d.min_child_samples.into()),
                    ("reg_lambda", d.reg_lambda.into()),
                    ("reg_alpha", d.reg_alpha.into()),
                    ("gamma", d.gamma.into()),
                    ("subsample", d.subsample.into()),
                    ("subsample_freq", d.subsample_freq.into()),
                    ("colsample_bytree", d.colsample_bytree.into()),
                ]
            }
            RegressionStrategy::LightGBM => {
                let d = LightGBMConfig::default();
                vec![
                    ("n_estimators", d.n_estimators.into()),
                    ("learning_rate", d.learning_rate.into()),
                    ("num_leaves", d.num_leaves.into()),
                    ("min_child_weight", d.min_child_weight.into()),
                    ("min_child_samples", d.min_child_samples.into()),
                    ("reg_lambda", d.reg_lambda.into()),
                    ("reg_alpha", d.reg_alpha.into()),
                    ("subsample", d.subsample.into()),
                    ("subsample_freq", d.subsample_freq.into()),
                    ("colsample_bytree", d.colsample_bytree.into()),
                ]
            }
            RegressionStrategy::GaussianMixture => {
                let d = GaussianMixtureRegressor::default();
                vec![
                    ("n_components", d.n_components.into()),
                    ("covariance_type", d.covariance_type.as_str().into()),
                    ("max_iter", d.max_iter.into()),
                ]
            }
        };
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    /// Build an unfitted regressor, applying `params` over the defaults
    pub fn construct(&self, params: &HyperParams) -> Result<Box<dyn Regressor>> {
        let accepted = self.accepted_params();
        if let Some(unknown) = params.keys().find(|k| !accepted.contains(&k.as_str())) {
            return Err(ExplorerError::InvalidParameter {
                name: unknown.clone(),
                value: params[unknown].to_string(),
                reason: format!("not a parameter of {}", self.name()),
            });
        }

        let p = params;
        let model: Box<dyn Regressor> = match self {
            RegressionStrategy::OrdinaryLeastSquares => Box::new(LinearRegression::new()),
            RegressionStrategy::PartialLeastSquares => {
                let d = PLSRegression::default();
                Box::new(
                    PLSRegression::new(usize_param(p, "n_components", d.n_components)?)
                        .with_max_iter(usize_param(p, "max_iter", d.max_iter)?),
                )
            }
            RegressionStrategy::LocallyWeightedPls => {
                let d = LocallyWeightedPLS::default();
                Box::new(LocallyWeightedPLS::new(
                    usize_param(p, "n_components", d.n_components)?,
                    float_param(p, "lambda_in_similarity", d.lambda_in_similarity)?,
                ))
            }
            RegressionStrategy::Ridge => {
                Box::new(RidgeRegression::new(float_param(p, "alpha", RidgeRegression::default().alpha)?))
            }
            RegressionStrategy::Lasso => {
                let d = LassoRegression::default();
                Box::new(
                    LassoRegression::new(float_param(p, "alpha", d.alpha)?)
                        .with_max_iter(usize_param(p, "max_iter", d.max_iter)?),
                )
            }
            RegressionStrategy::ElasticNet => {
                let d = ElasticNetRegression::default();
                let mut model = ElasticNetRegression::new(
                    float_param(p, "alpha", d.alpha)?,
                    float_param(p, "l1_ratio", d.l1_ratio)?,
                );
                model.max_iter = usize_param(p, "max_iter", d.max_iter)?;
                Box::new(model)
            }
            RegressionStrategy::LinearSvr => {
                Box::new(
                    SVMRegressor::linear(float_param(p, "C", 1.0)?, float_param(p, "epsilon", 0.0)?)
                        .with_max_iter(usize_param(p, "max_iter", SVMConfig::default().max_iter)?),
                )
            }
            RegressionStrategy::NonlinearSvr => {
                Box::new(
                    SVMRegressor::rbf(
                        float_param(p, "C", 1.0)?,
                        float_param(p, "epsilon", 0.1)?,
                        float_param(p, "gamma", 1.0)?,
                    )
                    .with_max_iter(usize_param(p, "max_iter", SVMConfig::default().max_iter)?),
                )
            }
            RegressionStrategy::DecisionTree => {
                let d = DecisionTree::new_regressor();
                let mut tree = DecisionTree::new_regressor()
                    .with_min_samples_leaf(usize_param(p, "min_samples_leaf", d.min_samples_leaf)?)
                    .with_min_samples_split(usize_param(p, "min_samples_split", d.min_samples_split)?);
                if p.contains_key("max_depth") {
                    tree = tree.with_max_depth(usize_param(p, "max_depth", 0)?);
                }
                Box::new(tree)
            }
            RegressionStrategy::RandomForest => {
                let d = RandomForest::default();
                let mut forest = RandomForest::new_regressor(usize_param(p, "n_estimators", d.n_estimators)?)
                    .with_max_features(max_features_param(p)?)
                    .with_min_samples_leaf(usize_param(p, "min_samples_leaf", d.min_samples_leaf)?);
                if p.contains_key("max_depth") {
                    forest = forest.with_max_depth(usize_param(p, "max_depth", 0)?);
                }
                Box::new(forest)
            }
            RegressionStrategy::GradientBoosting => {
                let d = GradientBoostingConfig::default();
                Box::new(GradientBoostingRegressor::new(GradientBoostingConfig {
                    n_estimators: usize_param(p, "n_estimators", d.n_estimators)?,
                    learning_rate: float_param(p, "learning_rate", d.learning_rate)?,
                    max_depth: usize_param(p, "max_depth", d.max_depth)?,
                    min_samples_leaf: usize_param(p, "min_samples_leaf", d.min_samples_leaf)?,
                    subsample: float_param(p, "subsample", d.subsample)?,
                    max_features: max_features_param(p)?,
                    ..d
                }))
            }
            RegressionStrategy::XGBoost => {
                let d = XGBoostConfig::default();
                Box::new(XGBoostRegressor::new(XGBoostConfig {
                    n_estimators: usize_param(p, "n_estimators", d.n_estimators)?,
                    learning_rate: float_param(p, "learning_rate", d.learning_rate)?,
                    max_depth: usize_param(p, "max_depth", d.max_depth)?,
                    min_child_weight: float_param(p, "min_child_weight", d.min_child_weight)?,
                    min_child_samples: usize_param(p, "min_child_samples", d.min_child_samples)?,
                    reg_lambda: float_param(p, "reg_lambda", d.reg_lambda)?,
                    reg_alpha: float_param(p, "reg_alpha", d.reg_alpha)?,
                    gamma: float_param(p, "gamma", d.gamma)?,
                    subsample: float_param(p, "subsample", d.subsample)?,
                    subsample_freq: usize_param(p, "subsample_freq", d.subsample_freq)?,
                    colsample_bytree: float_param(p, "colsample_bytree", d.colsample_bytree)?,
                    ..d
                }))
            }
            RegressionStrategy::LightGBM => {
                let d = LightGBMConfig::default();
                let max_depth = if p.contains_key("max_depth") {
                    Some(usize_param(p, "max_depth", 0)?)
                } else {
                    d.max_depth
                };
                Box::new(LightGBMRegressor::new(LightGBMConfig {
                    n_estimators: usize_param(p, "n_estimators", d.n_estimators)?,
                    learning_rate: float_param(p, "learning_rate", d.learning_rate)?,
                    num_leaves: usize_param(p, "num_leaves", d.num_leaves)?,
                    max_depth,
                    min_child_samples: usize_param(p, "min_child_samples", d.min_child_samples)?,
                    min_child_weight: float_param(p, "min_child_weight", d.min_child_weight)?,
                    reg_lambda: float_param(p, "reg_lambda", d.reg_lambda)?,
                    reg_alpha: float_param(p, "reg_alpha", d.reg_alpha)?,
                    subsample: float_param(p, "subsample", d.subsample)?,
                    subsample_freq: usize_param(p, "subsample_freq", d.subsample_freq)?,
                    colsample_bytree: float_param(p, "colsample_bytree", d.colsample_bytree)?,
                    ..d
                }))
            }
            RegressionStrategy::GaussianMixture => {
                let d = GaussianMixtureRegressor::default();
                let covariance: CovarianceType = str_param(p, "covariance_type", d.covariance_type.as_str())?.parse()?;
                Box::new(
                    GaussianMixtureRegressor::new(usize_param(p, "n_components", d.n_components)?, covariance)
                        .with_max_iter(usize_param(p, "max_iter", d.max_iter)?),
                )
            }
        };
        Ok(model)
    }
}

fn booster_grid(grid: ParamGrid) -> ParamGrid {
    grid.with_model_param("n_estimators", ints(&[500]))
        .with_model_param("reg_alpha", floats(&[0.0, 0.003, 0.1]))
        .with_model_param("colsample_bytree", floats(&[0.4, 0.7, 1.0]))
        .with_model_param("subsample", floats(&[0.4, 1.0]))
        .with_model_param("subsample_freq", ints(&[0, 7]))
        .with_model_param("min_child_samples", ints(&[2, 5, 10]))
}

/// `max_features` as a fraction, a count, or one of `sqrt`/`log2`/`all`
fn max_features_param(params: &HyperParams) -> Result<MaxFeatures> {
    let invalid = |value: &ParamValue| ExplorerError::InvalidParameter {
        name: "max_features".to_string(),
        value: value.to_string(),
        reason: "expected a fraction in (0, 1], a count, or sqrt/log2/all".to_string(),
    };
    match params.get("max_features") {
        None => Ok(MaxFeatures::All),
        Some(ParamValue::Float(f)) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
        Some(ParamValue::Int(n)) if *n > 0 => Ok(MaxFeatures::Fixed(*n as usize)),
        Some(ParamValue::Str(s)) => match s.to_ascii_lowercase().as_str() {
            "sqrt" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            "all" => Ok(MaxFeatures::All),
            _ => Err(invalid(&ParamValue::Str(s.clone()))),
        },
        Some(other) => Err(invalid(other)),
    }
}

impl fmt::Display for RegressionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RegressionStrategy {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    #[test]
    fn test_catalog_order_and_names() {
        assert_eq!(
            RegressionStrategy::names(),
            vec!["OLS", "PLS", "LWPLS", "Ridge", "Lasso", "EN", "LSVR", "NSVR", "DT", "RF", "GBDT", "XGB", "LGB", "GMR"]
        );
        for s in RegressionStrategy::all() {
            assert_eq!(RegressionStrategy::from_name(s.name()).unwrap(), *s);
            assert_eq!(RegressionStrategy::from_name(s.long_name()).unwrap(), *s);
        }
        assert_eq!("ridge".parse::<RegressionStrategy>().unwrap(), RegressionStrategy::Ridge);
        assert!(matches!(
            RegressionStrategy::from_name("knn"),
            Err(ExplorerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_scaling_policy() {
        let unscaled: Vec<_> = RegressionStrategy::all()
            .iter()
            .filter(|s| !s.requires_scaling())
            .map(|s| s.name())
            .collect();
        assert_eq!(unscaled, vec!["DT", "RF", "GBDT", "XGB", "LGB"]);
    }

    #[test]
    fn test_grid_sizes() {
        let size = |s: RegressionStrategy| s.param_grid().n_candidates();
        assert_eq!(size(RegressionStrategy::OrdinaryLeastSquares), 1);
        assert_eq!(size(RegressionStrategy::PartialLeastSquares), 26 * 2);
        assert_eq!(size(RegressionStrategy::LocallyWeightedPls), 26 * 15);
        assert_eq!(size(RegressionStrategy::Ridge), 25);
        assert_eq!(size(RegressionStrategy::Lasso), 15);
        assert_eq!(size(RegressionStrategy::ElasticNet), 15 * 100);
        assert_eq!(size(RegressionStrategy::LinearSvr), 10 * 10);
        assert_eq!(size(RegressionStrategy::NonlinearSvr), 15 * 10 * 31);
        assert_eq!(size(RegressionStrategy::DecisionTree), 29);
        assert_eq!(size(RegressionStrategy::RandomForest), 10);
        assert_eq!(size(RegressionStrategy::GradientBoosting), 10);
        assert_eq!(size(RegressionStrategy::XGBoost), 3 * 3 * 2 * 2 * 3);
        assert_eq!(size(RegressionStrategy::LightGBM), 3 * 3 * 2 * 2 * 3 * 2 * 4);
        assert_eq!(size(RegressionStrategy::GaussianMixture), 30 * 4);
    }

    #[test]
    fn test_grid_keys_are_accepted() {
        for s in RegressionStrategy::all() {
            for key in s.param_grid().keys() {
                assert_eq!(key.step, PipelineStep::Model);
                assert!(s.accepted_params().contains(&key.name.as_str()), "{} {}", s, key);
            }
            for name in s.default_params().keys() {
                assert!(s.accepted_params().contains(&name.as_str()), "{} {}", s, name);
            }
        }
    }

    #[test]
    fn test_construct_and_fit_with_defaults() {
        let x = Array2::from_shape_fn((30, 3), |(i, j)| ((i * (j + 1)) % 7) as f64 + 0.1 * i as f64);
        let y: Array1<f64> = x.column(0).to_owned() * 2.0 + &x.column(1);
        for s in RegressionStrategy::all() {
            let mut params = s.default_params();
            // Keep the ensembles small
            if params.contains_key("n_estimators") {
                params.insert("n_estimators".to_string(), ParamValue::Int(5));
            }
            let mut model = s.construct(&params).unwrap();
            model.fit(&x, &y).unwrap_or_else(|e| panic!("{} failed: {}", s, e));
            assert_eq!(model.predict(&x).unwrap().len(), 30);
        }
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let mut params = HyperParams::new();
        params.insert("alpha".to_string(), ParamValue::Float(1.0));
        let err = RegressionStrategy::OrdinaryLeastSquares.construct(&params).unwrap_err();
        assert!(matches!(err, ExplorerError::InvalidParameter { ref name, .. } if name == "alpha"));

        let mut params = HyperParams::new();
        params.insert("alpha".to_string(), ParamValue::from("big"));
        assert!(RegressionStrategy::Ridge.construct(&params).is_err());
    }
}
