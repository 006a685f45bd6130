//! Support vector regression
//!
//! Both the linear and the kernel variant solve the epsilon-insensitive SVR
//! dual by coordinate descent over `beta_i = alpha_i - alpha_i*`, with
//! `-C <= beta_i <= C`. The intercept is absorbed by augmenting the kernel
//! with a constant 1 (equivalently, a bias feature), so it is regularized
//! like the weights.

use super::models::{check_fit_input, check_predict_width, Regressor};
use crate::error::{ExplorerError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF { gamma: f64 },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF { gamma: 1.0 }
    }
}

impl KernelType {
    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            KernelType::Linear => a.dot(&b),
            KernelType::RBF { gamma } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v).powi(2)).sum();
                (-gamma * norm_sq).exp()
            }
        }
    }
}

/// SVR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Half-width of the insensitive tube
    pub epsilon: f64,
    pub kernel: KernelType,
    /// Stop when the largest dual step in an epoch falls below this
    pub tol: f64,
    /// Maximum number of epochs
    pub max_iter: usize,
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.1,
            kernel: KernelType::RBF { gamma: 1.0 },
            tol: 1e-4,
            max_iter: 1000,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum FittedSvr {
    Linear {
        weights: Array1<f64>,
        bias: f64,
    },
    Kernel {
        support_vectors: Array2<f64>,
        coefs: Array1<f64>,
        bias: f64,
    },
}

/// Epsilon-insensitive support vector regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMRegressor {
    config: SVMConfig,
    fitted: Option<FittedSvr>,
    n_features: usize,
}

impl SVMRegressor {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            fitted: None,
            n_features: 0,
        }
    }

    /// Linear SVR with the given `C` and `epsilon`
    pub fn linear(c: f64, epsilon: f64) -> Self {
        Self::new(SVMConfig {
            c,
            epsilon,
            kernel: KernelType::Linear,
            ..Default::default()
        })
    }

    /// RBF-kernel SVR
    pub fn rbf(c: f64, epsilon: f64, gamma: f64) -> Self {
        Self::new(SVMConfig {
            c,
            epsilon,
            kernel: KernelType::RBF { gamma },
            ..Default::default()
        })
    }

    /// Cap the number of solver epochs
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    fn validate(&self) -> Result<()> {
        let checks = [("C", self.config.c, self.config.c > 0.0), ("epsilon", self.config.epsilon, self.config.epsilon >= 0.0)];
        for (name, value, ok) in checks {
            if !ok {
                return Err(ExplorerError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "out of range".to_string(),
                });
            }
        }
        if let KernelType::RBF { gamma } = self.config.kernel {
            if gamma <= 0.0 {
                return Err(ExplorerError::InvalidParameter {
                    name: "gamma".to_string(),
                    value: gamma.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }
        Ok(())
    }

    /// One coordinate step on `beta_i` given the current decision value `g`
    #[inline]
    fn dual_step(beta_i: f64, g: f64, y_i: f64, q_ii: f64, epsilon: f64, c: f64) -> f64 {
        let grad = g - y_i;
        let gp = grad + epsilon;
        let gn = grad - epsilon;
        let d = if gp < q_ii * beta_i {
            -gp / q_ii
        } else if gn > q_ii * beta_i {
            -gn / q_ii
        } else {
            -beta_i
        };
        (beta_i + d).clamp(-c, c)
    }

    fn fit_linear(&self, x: &Array2<f64>, y: &Array1<f64>, rng: &mut Xoshiro256PlusPlus) -> FittedSvr {
        let (n, n_features) = x.dim();
        let SVMConfig { c, epsilon, tol, max_iter, .. } = self.config;

        // Augmented weight vector: last entry is the bias
        let mut w = Array1::<f64>::zeros(n_features + 1);
        let mut beta = Array1::<f64>::zeros(n);
        let q_diag: Vec<f64> = x.rows().into_iter().map(|r| r.dot(&r) + 1.0).collect();
        let mut order: Vec<usize> = (0..n).collect();

        for _epoch in 0..max_iter {
            order.shuffle(rng);
            let mut max_step: f64 = 0.0;
            for &i in &order {
                let row = x.row(i);
                let g = row.dot(&w.slice(ndarray::s![..n_features])) + w[n_features];
                let new_beta = Self::dual_step(beta[i], g, y[i], q_diag[i], epsilon, c);
                let d = new_beta - beta[i];
                if d != 0.0 {
                    beta[i] = new_beta;
                    w.slice_mut(ndarray::s![..n_features]).scaled_add(d, &row);
                    w[n_features] += d;
                    max_step = max_step.max(d.abs());
                }
            }
            if max_step < tol {
                break;
            }
        }

        FittedSvr::Linear {
            weights: w.slice(ndarray::s![..n_features]).to_owned(),
            bias: w[n_features],
        }
    }

    fn fit_kernel(&self, x: &Array2<f64>, y: &Array1<f64>, rng: &mut Xoshiro256PlusPlus) -> Result<FittedSvr> {
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(ExplorerError::InvalidInput(format!(
                "Dataset has {} samples, exceeding the maximum {} for SVR kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        let SVMConfig { c, epsilon, tol, max_iter, .. } = self.config;
        let kernel = &self.config.kernel;

        // K + 1 absorbs the intercept
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| kernel.eval(x.row(i), x.row(j)) + 1.0).collect())
            .collect();
        let k = Array2::from_shape_fn((n, n), |(i, j)| rows[i][j]);

        let mut beta = Array1::<f64>::zeros(n);
        let mut decision = Array1::<f64>::zeros(n);
        let mut order: Vec<usize> = (0..n).collect();

        for _epoch in 0..max_iter {
            order.shuffle(rng);
            let mut max_step: f64 = 0.0;
            for &i in &order {
                let new_beta = Self::dual_step(beta[i], decision[i], y[i], k[[i, i]], epsilon, c);
                let d = new_beta - beta[i];
                if d != 0.0 {
                    beta[i] = new_beta;
                    decision.scaled_add(d, &k.row(i));
                    max_step = max_step.max(d.abs());
                }
            }
            if max_step < tol {
                break;
            }
        }

        let support: Vec<usize> = (0..n).filter(|&i| beta[i].abs() > 1e-12).collect();
        let bias = beta.sum();
        Ok(FittedSvr::Kernel {
            support_vectors: x.select(ndarray::Axis(0), &support),
            coefs: beta.select(ndarray::Axis(0), &support),
            bias,
        })
    }
}

impl Default for SVMRegressor {
    fn default() -> Self {
        Self::new(SVMConfig::default())
    }
}

impl Regressor for SVMRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.validate()?;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        let fitted = match self.config.kernel {
            KernelType::Linear => self.fit_linear(x, y, &mut rng),
            KernelType::RBF { .. } => self.fit_kernel(x, y, &mut rng)?,
        };
        self.fitted = Some(fitted);
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or(ExplorerError::ModelNotFitted)?;
        check_predict_width(x, self.n_features)?;

        match fitted {
            FittedSvr::Linear { weights, bias } => Ok(x.dot(weights) + *bias),
            FittedSvr::Kernel { support_vectors, coefs, bias } => {
                let preds: Vec<f64> = (0..x.nrows())
                    .into_par_iter()
                    .map(|i| {
                        let row = x.row(i);
                        support_vectors
                            .rows()
                            .into_iter()
                            .zip(coefs.iter())
                            .map(|(sv, &b)| b * self.config.kernel.eval(sv, row))
                            .sum::<f64>()
                            + bias
                    })
                    .collect();
                Ok(Array1::from_vec(preds))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn line() -> (Array2<f64>, Array1<f64>) {
        let x = Array::linspace(-2.0, 2.0, 40).insert_axis(ndarray::Axis(1));
        let y = x.column(0).mapv(|v| 1.5 * v + 0.5);
        (x, y)
    }

    #[test]
    fn test_linear_svr_recovers_line() {
        let (x, y) = line();
        let mut svr = SVMRegressor::linear(10.0, 0.01);
        svr.fit(&x, &y).unwrap();
        let pred = svr.predict(&x).unwrap();
        let max_err = pred.iter().zip(y.iter()).map(|(p, t)| (p - t).abs()).fold(0.0, f64::max);
        assert!(max_err < 0.1, "max error {}", max_err);
    }

    #[test]
    fn test_rbf_svr_fits_nonlinear() {
        let x = Array::linspace(-3.0, 3.0, 50).insert_axis(ndarray::Axis(1));
        let y = x.column(0).mapv(f64::sin);
        let mut svr = SVMRegressor::rbf(10.0, 0.01, 1.0);
        svr.fit(&x, &y).unwrap();
        let pred = svr.predict(&x).unwrap();
        let r2 = crate::training::r2_score(&y, &pred).unwrap();
        assert!(r2 > 0.95, "r2 = {}", r2);
    }

    #[test]
    fn test_invalid_c() {
        let (x, y) = line();
        let mut svr = SVMRegressor::linear(0.0, 0.1);
        assert!(matches!(svr.fit(&x, &y), Err(ExplorerError::InvalidParameter { .. })));
    }

    #[test]
    fn test_predict_before_fit() {
        let svr = SVMRegressor::default();
        assert!(svr.predict(&Array2::zeros((1, 1))).is_err());
    }
}
