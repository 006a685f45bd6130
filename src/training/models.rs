//! Regressor trait and evaluation metrics

use crate::error::{ExplorerError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Regression scores computed from one set of predictions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Coefficient of determination
    pub r2: f64,
    /// Mean absolute error
    pub mae: f64,
    /// Mean squared error
    pub mse: f64,
    /// Square root of `mse`
    pub rmse: f64,
}

impl RegressionMetrics {
    /// Compute R², MAE, MSE and RMSE.
    ///
    /// R² follows the usual convention for a constant target: 1 for a perfect
    /// fit, 0 otherwise.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(ExplorerError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(ExplorerError::InvalidInput(
                "cannot score an empty prediction set".to_string(),
            ));
        }

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        let mse = ss_res / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean = y_true.sum() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Self {
            r2,
            mae,
            mse,
            rmse: mse.sqrt(),
        })
    }
}

/// R² only, used as the grid-search score
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    Ok(RegressionMetrics::compute(y_true, y_pred)?.r2)
}

/// Common interface for every regressor the catalog can construct
pub trait Regressor: Send + Sync + std::fmt::Debug {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Validate the shapes of a training set before fitting
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ExplorerError::sample_mismatch(x.nrows(), y.len()));
    }
    if x.nrows() == 0 {
        return Err(ExplorerError::InvalidInput("cannot fit on zero rows".to_string()));
    }
    if x.ncols() == 0 {
        return Err(ExplorerError::NoFeaturesRemain {
            step: "fit".to_string(),
        });
    }
    Ok(())
}

/// Validate predict-time width against the fitted width
pub(crate) fn check_predict_width(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(ExplorerError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![3.0, -0.5, 2.0, 7.0];
        let y_pred = array![2.5, 0.0, 2.0, 8.0];

        let m = RegressionMetrics::compute(&y_true, &y_pred).unwrap();
        assert!((m.mse - 0.375).abs() < 1e-12);
        assert!((m.mae - 0.5).abs() < 1e-12);
        assert!((m.rmse - m.mse.sqrt()).abs() < 1e-15);
        assert!((m.r2 - 0.9486081370449679).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_prediction_r2_is_one() {
        let y = array![1.0, 2.0, 3.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);

        let constant = array![2.0, 2.0];
        assert_eq!(r2_score(&constant, &constant).unwrap(), 1.0);
        assert_eq!(r2_score(&constant, &array![1.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        let err = RegressionMetrics::compute(&array![1.0, 2.0], &array![1.0]).unwrap_err();
        assert!(matches!(err, ExplorerError::ShapeError { .. }));
    }
}
