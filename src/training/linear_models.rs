//! Linear model implementations

use super::linalg::solve_spd;
use super::models::{check_fit_input, check_predict_width, Regressor};
use crate::error::{ExplorerError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Center `x` and `y` column-wise, returning the means for the intercept
fn center(x: &Array2<f64>, y: &Array1<f64>) -> (Array2<f64>, Array1<f64>, Array1<f64>, f64) {
    let x_mean = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()));
    let y_mean = y.mean().unwrap_or(0.0);
    let x_c = x - &x_mean.view().insert_axis(Axis(0));
    let y_c = y - y_mean;
    (x_c, y_c, x_mean, y_mean)
}

/// Fitted linear coefficients shared by every model in this file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LinearFit {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearFit {
    fn from_centered(w: Array1<f64>, x_mean: &Array1<f64>, y_mean: f64) -> Self {
        let intercept = y_mean - w.dot(x_mean);
        Self {
            coefficients: w,
            intercept,
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_predict_width(x, self.coefficients.len())?;
        Ok(x.dot(&self.coefficients) + self.intercept)
    }
}

/// Ordinary least squares with intercept
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    fitted: Option<LinearFit>,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.coefficients)
    }

    pub fn intercept(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.intercept)
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (x_c, y_c, x_mean, y_mean) = center(x, y);

        // Normal equations: (X^T X) w = X^T y
        let xtx = x_c.t().dot(&x_c);
        let xty = x_c.t().dot(&y_c);
        let w = solve_spd(&xtx, &xty).ok_or_else(|| {
            ExplorerError::ComputationError(
                "Matrix is singular, cannot solve least squares".to_string(),
            )
        })?;

        self.fitted = Some(LinearFit::from_centered(w, &x_mean, y_mean));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(ExplorerError::ModelNotFitted)?.predict(x)
    }
}

/// L2-regularized least squares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    /// L2 regularization strength
    pub alpha: f64,
    fitted: Option<LinearFit>,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fitted: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

impl Regressor for RidgeRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (x_c, y_c, x_mean, y_mean) = center(x, y);

        let mut xtx = x_c.t().dot(&x_c);
        for i in 0..x.ncols() {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_c.t().dot(&y_c);
        let w = solve_spd(&xtx, &xty)
            .ok_or_else(|| ExplorerError::ComputationError("Singular matrix".to_string()))?;

        self.fitted = Some(LinearFit::from_centered(w, &x_mean, y_mean));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(ExplorerError::ModelNotFitted)?.predict(x)
    }
}

/// Soft-threshold operator for the L1 proximal step
fn soft_threshold(val: f64, threshold: f64) -> f64 {
    if val > threshold {
        val - threshold
    } else if val < -threshold {
        val + threshold
    } else {
        0.0
    }
}

/// Cyclic coordinate descent for
/// `1/(2n) ||y - Xw||² + l1 ||w||_1 + l2/2 ||w||²` on centered data.
fn coordinate_descent(
    x_c: &Array2<f64>,
    y_c: &Array1<f64>,
    l1: f64,
    l2: f64,
    max_iter: usize,
    tol: f64,
) -> Array1<f64> {
    let n = x_c.nrows() as f64;
    let n_features = x_c.ncols();
    let col_norms: Vec<f64> = (0..n_features)
        .map(|j| x_c.column(j).mapv(|v| v * v).sum())
        .collect();

    let l1_penalty = l1 * n;
    let l2_penalty = l2 * n;

    let mut w = Array1::zeros(n_features);
    let mut r = y_c.clone();

    for _iter in 0..max_iter {
        let mut max_delta: f64 = 0.0;
        let mut max_w: f64 = 0.0;

        for j in 0..n_features {
            let denom = col_norms[j] + l2_penalty;
            if denom < 1e-15 {
                w[j] = 0.0;
                continue;
            }
            let old_wj = w[j];
            let rho = x_c.column(j).dot(&r) + col_norms[j] * old_wj;
            w[j] = soft_threshold(rho, l1_penalty) / denom;

            let delta = old_wj - w[j];
            if delta != 0.0 {
                r.scaled_add(delta, &x_c.column(j));
            }
            max_delta = max_delta.max(delta.abs());
            max_w = max_w.max(w[j].abs());
        }

        if max_w == 0.0 || max_delta / max_w < tol {
            break;
        }
    }

    w
}

/// L1-regularized least squares via coordinate descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    /// L1 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    fitted: Option<LinearFit>,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LassoRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            max_iter: 1000,
            tol: 1e-4,
            fitted: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.coefficients)
    }
}

impl Regressor for LassoRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (x_c, y_c, x_mean, y_mean) = center(x, y);
        let w = coordinate_descent(&x_c, &y_c, self.alpha, 0.0, self.max_iter, self.tol);
        self.fitted = Some(LinearFit::from_centered(w, &x_mean, y_mean));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(ExplorerError::ModelNotFitted)?.predict(x)
    }
}

/// Elastic Net (L1 + L2) via coordinate descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticNetRegression {
    /// Overall regularization strength
    pub alpha: f64,
    /// L1 ratio (0.0 = pure L2/Ridge, 1.0 = pure L1/Lasso)
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
    fitted: Option<LinearFit>,
}

impl Default for ElasticNetRegression {
    fn default() -> Self {
        Self::new(1.0, 0.5)
    }
}

impl ElasticNetRegression {
    pub fn new(alpha: f64, l1_ratio: f64) -> Self {
        Self {
            alpha,
            l1_ratio: l1_ratio.clamp(0.0, 1.0),
            max_iter: 1000,
            tol: 1e-4,
            fitted: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_l1_ratio(mut self, l1_ratio: f64) -> Self {
        self.l1_ratio = l1_ratio.clamp(0.0, 1.0);
        self
    }
}

impl Regressor for ElasticNetRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (x_c, y_c, x_mean, y_mean) = center(x, y);
        let w = coordinate_descent(
            &x_c,
            &y_c,
            self.alpha * self.l1_ratio,
            self.alpha * (1.0 - self.l1_ratio),
            self.max_iter,
            self.tol,
        );
        self.fitted = Some(LinearFit::from_centered(w, &x_mean, y_mean));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(ExplorerError::ModelNotFitted)?.predict(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        // y = 2*x1 - x2 + 3
        let x = array![
            [1.0, 2.0],
            [2.0, 1.0],
            [3.0, 4.0],
            [4.0, 3.0],
            [5.0, 5.0],
            [6.0, 2.0]
        ];
        let y = x.column(0).mapv(|v| 2.0 * v) - &x.column(1) + 3.0;
        (x, y)
    }

    #[test]
    fn test_linear_regression_simple() {
        let (x, y) = linear_data();
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-8);
        assert!((coef[1] + 1.0).abs() < 1e-8);
        assert!((model.intercept().unwrap() - 3.0).abs() < 1e-8);

        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-8);
        }
    }

    #[test]
    fn test_predict_before_fit() {
        let model = RidgeRegression::new(1.0);
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(ExplorerError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_ridge_shrinks_towards_zero() {
        let (x, y) = linear_data();
        let mut weak = RidgeRegression::new(1e-6);
        let mut strong = RidgeRegression::new(1e3);
        weak.fit(&x, &y).unwrap();
        strong.fit(&x, &y).unwrap();

        let weak_norm = weak.fitted.as_ref().unwrap().coefficients.mapv(|v| v * v).sum();
        let strong_norm = strong.fitted.as_ref().unwrap().coefficients.mapv(|v| v * v).sum();
        assert!(strong_norm < weak_norm);
    }

    #[test]
    fn test_lasso_zeroes_irrelevant_feature() {
        let x = array![
            [1.0, 0.3],
            [2.0, -0.1],
            [3.0, 0.2],
            [4.0, -0.3],
            [5.0, 0.1],
            [6.0, -0.2]
        ];
        let y = x.column(0).mapv(|v| 3.0 * v);
        let mut model = LassoRegression::new(0.1);
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients().unwrap();
        assert!(coef[0] > 2.5);
        assert_eq!(coef[1], 0.0);
    }

    #[test]
    fn test_elastic_net_fits() {
        let (x, y) = linear_data();
        let mut model = ElasticNetRegression::new(0.001, 0.5);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        let r2 = crate::training::r2_score(&y, &pred).unwrap();
        assert!(r2 > 0.99);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut model = LinearRegression::new();
        let err = model.fit(&array![[1.0], [2.0]], &array![1.0]).unwrap_err();
        assert!(matches!(err, ExplorerError::ShapeError { .. }));
    }
}
