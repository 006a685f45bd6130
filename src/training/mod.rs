//! Regression models and evaluation
//!
//! Provides the estimators behind the strategy catalog:
//! - Linear models (OLS, Ridge, Lasso, ElasticNet)
//! - Partial least squares and locally weighted PLS
//! - Support vector regression (linear and RBF kernels)
//! - Decision trees and Random Forests
//! - Gradient boosting, XGBoost-style and LightGBM-style boosting
//! - Gaussian mixture regression
//!
//! plus k-fold splitting and regression metrics.

mod linalg;
mod models;
pub mod cross_validation;
pub mod linear_models;
pub mod pls;
pub mod svm;
pub mod decision_tree;
pub mod random_forest;
pub mod gradient_boosting;
pub mod xgboost;
pub mod lightgbm;
pub mod gaussian_mixture;

pub use models::{r2_score, RegressionMetrics, Regressor};
pub use cross_validation::{train_test_split, CVResults, CVSplit, KFold};
pub use linear_models::{ElasticNetRegression, LassoRegression, LinearRegression, RidgeRegression};
pub use pls::{LocallyWeightedPLS, PLSRegression};
pub use svm::{KernelType, SVMConfig, SVMRegressor};
pub use decision_tree::{DecisionTree, TreeNode};
pub use random_forest::{MaxFeatures, RandomForest};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
pub use lightgbm::{LightGBMConfig, LightGBMRegressor};
pub use gaussian_mixture::{CovarianceType, GaussianMixtureRegressor};
