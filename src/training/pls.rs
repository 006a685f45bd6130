//! Partial least squares regression
//!
//! [`PLSRegression`] is single-target NIPALS with internal autoscaling.
//! [`LocallyWeightedPLS`] refits a similarity-weighted PLS around every
//! query row, so it keeps the training set and does its work in `predict`.

use super::linalg::matrix_inverse;
use super::models::{check_fit_input, check_predict_width, Regressor};
use crate::error::{ExplorerError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Largest usable component count for the given training shape
fn component_limit(n_samples: usize, n_features: usize) -> usize {
    n_features.min(n_samples.saturating_sub(1)).max(1)
}

fn clamp_components(requested: usize, n_samples: usize, n_features: usize, model: &str) -> usize {
    let limit = component_limit(n_samples, n_features);
    if requested > limit {
        warn!(model, requested, limit, "n_components exceeds data rank; clamping");
        limit
    } else {
        requested.max(1)
    }
}

/// Single-target PLS regression (NIPALS)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PLSRegression {
    pub n_components: usize,
    /// Iteration cap for the inner NIPALS loop
    pub max_iter: usize,
    pub tol: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
}

impl Default for PLSRegression {
    fn default() -> Self {
        Self::new(2)
    }
}

impl PLSRegression {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            max_iter: 500,
            tol: 1e-6,
            coefficients: None,
            intercept: 0.0,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Coefficients expressed in the original (unscaled) feature units
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }
}

/// Column means and sample standard deviations; zero spread maps to 1
fn autoscale_params(x: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
    let mean = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()));
    let ddof = if x.nrows() > 1 { 1.0 } else { 0.0 };
    let std = x
        .std_axis(Axis(0), ddof)
        .mapv(|s| if s > 1e-12 { s } else { 1.0 });
    (mean, std)
}

impl Regressor for PLSRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (n_samples, n_features) = x.dim();
        let k = clamp_components(self.n_components, n_samples, n_features, "PLS");

        let (x_mean, x_std) = autoscale_params(x);
        let y_mean = y.mean().unwrap_or(0.0);
        let y_std = if n_samples > 1 { y.std(1.0) } else { 0.0 };
        let y_std = if y_std > 1e-12 { y_std } else { 1.0 };

        let mut xk = (x - &x_mean.view().insert_axis(Axis(0))) / &x_std.view().insert_axis(Axis(0));
        let mut yk = (y - y_mean) / y_std;

        let mut w_mat = Array2::<f64>::zeros((n_features, k));
        let mut p_mat = Array2::<f64>::zeros((n_features, k));
        let mut q_vec = Array1::<f64>::zeros(k);
        let mut used = 0;

        for a in 0..k {
            // NIPALS: alternate between X and y scores until the weights settle
            let mut u = yk.clone();
            let mut w = Array1::<f64>::zeros(n_features);
            for _ in 0..self.max_iter.max(1) {
                let uu = u.dot(&u);
                if uu < 1e-300 {
                    break;
                }
                let mut w_new = xk.t().dot(&u) / uu;
                let norm = w_new.dot(&w_new).sqrt();
                if norm < 1e-300 {
                    break;
                }
                w_new /= norm;
                let t = xk.dot(&w_new);
                let q = yk.dot(&t) / t.dot(&t).max(1e-300);
                let converged = (&w_new - &w).mapv(|v| v * v).sum() < self.tol * self.tol;
                w = w_new;
                if q.abs() < 1e-300 || converged {
                    break;
                }
                u = &yk / q;
            }

            let t = xk.dot(&w);
            let tt = t.dot(&t);
            if tt < 1e-12 {
                break;
            }
            let p = xk.t().dot(&t) / tt;
            let q = yk.dot(&t) / tt;

            // Deflate
            for i in 0..n_samples {
                for j in 0..n_features {
                    xk[[i, j]] -= t[i] * p[j];
                }
            }
            yk.scaled_add(-q, &t);

            w_mat.column_mut(a).assign(&w);
            p_mat.column_mut(a).assign(&p);
            q_vec[a] = q;
            used += 1;
        }

        if used == 0 {
            return Err(ExplorerError::ComputationError(
                "PLS extracted no components from the data".to_string(),
            ));
        }

        let w_mat = w_mat.slice(ndarray::s![.., ..used]).to_owned();
        let p_mat = p_mat.slice(ndarray::s![.., ..used]).to_owned();
        let q_vec = q_vec.slice(ndarray::s![..used]).to_owned();

        // B = W (P^T W)^-1 q, in scaled units
        let ptw_inv = matrix_inverse(&p_mat.t().dot(&w_mat)).ok_or_else(|| {
            ExplorerError::ComputationError("PLS loading matrix is singular".to_string())
        })?;
        let b_scaled = w_mat.dot(&ptw_inv.dot(&q_vec));

        let coefficients = &b_scaled / &x_std * y_std;
        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(ExplorerError::ModelNotFitted)?;
        check_predict_width(x, coefficients.len())?;
        Ok(x.dot(coefficients) + self.intercept)
    }
}

/// Locally weighted PLS.
///
/// For a query row `q`, training rows are weighted by
/// `exp(-d_i / (std(d) * lambda))` where `d` holds the Euclidean distances
/// to `q`, and a weighted PLS model is fitted on the weighted-centered data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocallyWeightedPLS {
    pub n_components: usize,
    /// Bandwidth of the similarity kernel
    pub lambda_in_similarity: f64,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
    components: usize,
}

impl Default for LocallyWeightedPLS {
    fn default() -> Self {
        Self::new(2, 1.0)
    }
}

impl LocallyWeightedPLS {
    pub fn new(n_components: usize, lambda_in_similarity: f64) -> Self {
        Self {
            n_components,
            lambda_in_similarity,
            x_train: None,
            y_train: None,
            components: 0,
        }
    }

    fn predict_one(&self, x: &Array2<f64>, y: &Array1<f64>, query: ArrayView1<f64>) -> f64 {
        let n = x.nrows();

        let distances: Array1<f64> = x
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .collect();
        let d_std = if n > 1 { distances.std(1.0) } else { 0.0 };
        let bandwidth = if d_std > 1e-12 { d_std } else { 1.0 } * self.lambda_in_similarity;
        let sim = distances.mapv(|d| (-d / bandwidth).exp());
        let sim_sum = sim.sum().max(1e-300);

        let y_w = sim.dot(y) / sim_sum;
        let x_w = x.t().dot(&sim) / sim_sum;

        let mut xc = x - &x_w.view().insert_axis(Axis(0));
        let mut yc = y - y_w;
        let mut qc = &query - &x_w;

        let mut prediction = y_w;
        for _ in 0..self.components {
            // w = Xc^T S yc / ||Xc^T S yc||
            let sy = &sim * &yc;
            let mut w = xc.t().dot(&sy);
            let norm = w.dot(&w).sqrt();
            if norm < 1e-12 {
                break;
            }
            w /= norm;

            let t = xc.dot(&w);
            let st = &sim * &t;
            let tst = t.dot(&st);
            if tst < 1e-12 {
                break;
            }
            let p = xc.t().dot(&st) / tst;
            let q = yc.dot(&st) / tst;
            let t_q = qc.dot(&w);

            prediction += t_q * q;

            for i in 0..n {
                for j in 0..xc.ncols() {
                    xc[[i, j]] -= t[i] * p[j];
                }
            }
            yc.scaled_add(-q, &t);
            qc.scaled_add(-t_q, &p);
        }

        prediction
    }
}

impl Regressor for LocallyWeightedPLS {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if !(self.lambda_in_similarity > 0.0) {
            return Err(ExplorerError::InvalidParameter {
                name: "lambda_in_similarity".to_string(),
                value: self.lambda_in_similarity.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        self.components = clamp_components(self.n_components, x.nrows(), x.ncols(), "LWPLS");
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(xt), Some(yt)) => (xt, yt),
            _ => return Err(ExplorerError::ModelNotFitted),
        };
        check_predict_width(x, x_train.ncols())?;

        let preds: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.predict_one(x_train, y_train, x.row(i)))
            .collect();
        Ok(Array1::from_vec(preds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 0.5, 2.0],
            [2.0, 1.5, 1.0],
            [3.0, 0.0, 4.0],
            [4.0, 2.0, 3.0],
            [5.0, 1.0, 5.0],
            [6.0, 3.0, 2.5],
            [7.0, 2.5, 6.0],
            [8.0, 0.5, 1.5]
        ];
        let y = x.column(0).mapv(|v| 1.5 * v) + x.column(1).mapv(|v| -2.0 * v) + x.column(2) + 4.0;
        (x, y)
    }

    #[test]
    fn test_pls_full_rank_matches_ols() {
        let (x, y) = data();
        let mut pls = PLSRegression::new(3);
        pls.fit(&x, &y).unwrap();

        let coef = pls.coefficients().unwrap();
        assert!((coef[0] - 1.5).abs() < 1e-6);
        assert!((coef[1] + 2.0).abs() < 1e-6);
        assert!((coef[2] - 1.0).abs() < 1e-6);

        let pred = pls.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-6);
        }
    }

    #[test]
    fn test_pls_clamps_components() {
        let (x, y) = data();
        let mut pls = PLSRegression::new(30);
        assert!(pls.fit(&x, &y).is_ok());
        assert!(pls.predict(&x).is_ok());
    }

    #[test]
    fn test_pls_single_component_is_reasonable() {
        let (x, y) = data();
        let mut pls = PLSRegression::new(1);
        pls.fit(&x, &y).unwrap();
        let pred = pls.predict(&x).unwrap();
        let r2 = crate::training::r2_score(&y, &pred).unwrap();
        assert!(r2 > 0.5, "r2 = {}", r2);
    }

    #[test]
    fn test_lwpls_fits_linear_data() {
        let (x, y) = data();
        let mut model = LocallyWeightedPLS::new(3, 1.0);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-6, "{} vs {}", p, t);
        }
    }

    #[test]
    fn test_lwpls_rejects_bad_bandwidth() {
        let (x, y) = data();
        let mut model = LocallyWeightedPLS::new(2, 0.0);
        assert!(matches!(
            model.fit(&x, &y),
            Err(ExplorerError::InvalidParameter { .. })
        ));
    }
}
