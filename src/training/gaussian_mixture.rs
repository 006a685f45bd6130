//! Gaussian mixture regression
//!
//! A Gaussian mixture is fitted by EM on the joint matrix `[X | y]`.
//! Prediction is the conditional mean `E[y | x]`: each component's linear
//! conditional mean, weighted by the component's responsibility for `x`
//! under the marginal mixture over the features.

use super::linalg::{cholesky, cholesky_back_substitute};
use super::models::{check_fit_input, check_predict_width, Regressor};
use crate::error::{ExplorerError, Result};
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Covariance structure shared by the mixture components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovarianceType {
    /// One unrestricted covariance matrix per component
    Full,
    /// One covariance matrix shared by all components
    Tied,
    /// Diagonal covariance per component
    Diag,
    /// Single variance per component
    Spherical,
}

impl CovarianceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CovarianceType::Full => "full",
            CovarianceType::Tied => "tied",
            CovarianceType::Diag => "diag",
            CovarianceType::Spherical => "spherical",
        }
    }
}

impl fmt::Display for CovarianceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CovarianceType {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(CovarianceType::Full),
            "tied" => Ok(CovarianceType::Tied),
            "diag" => Ok(CovarianceType::Diag),
            "spherical" => Ok(CovarianceType::Spherical),
            other => Err(ExplorerError::InvalidParameter {
                name: "covariance_type".to_string(),
                value: other.to_string(),
                reason: "expected one of full, tied, diag, spherical".to_string(),
            }),
        }
    }
}

/// Per-component pieces needed for `E[y | x]`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConditionalComponent {
    log_weight: f64,
    mean_x: Array1<f64>,
    mean_y: f64,
    chol_xx: Array2<f64>,
    log_det_xx: f64,
    /// `Σxx⁻¹ Σxy`
    coef: Array1<f64>,
}

/// Gaussian mixture regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianMixtureRegressor {
    pub n_components: usize,
    pub covariance_type: CovarianceType,
    pub max_iter: usize,
    pub tol: f64,
    /// Added to covariance diagonals
    pub reg_covar: f64,
    pub random_state: Option<u64>,
    components: Vec<ConditionalComponent>,
    n_features: usize,
    converged: bool,
    n_iter: usize,
}

impl Default for GaussianMixtureRegressor {
    fn default() -> Self {
        Self::new(1, CovarianceType::Full)
    }
}

impl GaussianMixtureRegressor {
    pub fn new(n_components: usize, covariance_type: CovarianceType) -> Self {
        Self {
            n_components,
            covariance_type,
            max_iter: 100,
            tol: 1e-3,
            reg_covar: 1e-6,
            random_state: Some(42),
            components: Vec::new(),
            n_features: 0,
            converged: false,
            n_iter: 0,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Whether EM met the tolerance on the last fit
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Fit the joint mixture, returning weights, means and expanded covariances
    fn fit_mixture(&mut self, z: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>, Vec<Array2<f64>>)> {
        let n = z.nrows();
        let k = self.n_components;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(42));

        let labels = kmeans_labels(z, k, &mut rng);
        let mut resp = Array2::<f64>::zeros((n, k));
        for (i, &label) in labels.iter().enumerate() {
            resp[[i, label]] = 1.0;
        }

        let (mut weights, mut means, mut covariances) = self.m_step(z, &resp);
        let mut lower_bound = f64::NEG_INFINITY;
        self.converged = false;
        self.n_iter = 0;

        for iter in 1..=self.max_iter {
            let (new_resp, bound) = e_step(z, &weights, &means, &covariances)?;
            resp = new_resp;
            let (w, m, c) = self.m_step(z, &resp);
            weights = w;
            means = m;
            covariances = c;
            self.n_iter = iter;

            if (bound - lower_bound).abs() < self.tol {
                self.converged = true;
                break;
            }
            lower_bound = bound;
        }

        if !self.converged {
            warn!(
                n_components = k,
                covariance_type = %self.covariance_type,
                max_iter = self.max_iter,
                "Gaussian mixture did not converge"
            );
        }
        Ok((weights, means, covariances))
    }

    fn m_step(&self, z: &Array2<f64>, resp: &Array2<f64>) -> (Array1<f64>, Array2<f64>, Vec<Array2<f64>>) {
        let (n, d) = z.dim();
        let k = self.n_components;
        let nk = resp.sum_axis(Axis(0)).mapv(|v| v + 10.0 * f64::EPSILON);
        let means = resp.t().dot(z) / &nk.view().insert_axis(Axis(1));

        let scatter = |c: usize| -> Array2<f64> {
            let diff = z - &means.row(c);
            let weighted = &diff * &resp.column(c).insert_axis(Axis(1));
            weighted.t().dot(&diff)
        };

        let reg = Array2::<f64>::eye(d) * self.reg_covar;
        let covariances = match self.covariance_type {
            CovarianceType::Full => (0..k).map(|c| scatter(c) / nk[c] + &reg).collect(),
            CovarianceType::Tied => {
                let total = (0..k).fold(Array2::<f64>::zeros((d, d)), |acc, c| acc + scatter(c));
                let shared = total / nk.sum() + &reg;
                vec![shared; k]
            }
            CovarianceType::Diag => (0..k)
                .map(|c| {
                    let var = scatter(c).diag().mapv(|v| v / nk[c] + self.reg_covar);
                    Array2::from_diag(&var)
                })
                .collect(),
            CovarianceType::Spherical => (0..k)
                .map(|c| {
                    let var = scatter(c).diag().mean().unwrap_or(0.0) / nk[c] + self.reg_covar;
                    Array2::<f64>::eye(d) * var
                })
                .collect(),
        };

        let weights = &nk / n as f64;
        (weights, means, covariances)
    }
}

/// Solve `L v = b` for lower-triangular `L`
fn forward_substitute(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut v = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * v[j];
        }
        v[i] = (b[i] - sum) / l[[i, i]];
    }
    v
}

fn log_det_from_cholesky(l: &Array2<f64>) -> f64 {
    2.0 * l.diag().iter().map(|v| v.ln()).sum::<f64>()
}

fn log_gaussian(diff: ArrayView1<f64>, chol: &Array2<f64>, log_det: f64) -> f64 {
    let v = forward_substitute(chol, diff);
    -0.5 * (diff.len() as f64 * LN_2PI + log_det + v.dot(&v))
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

fn ill_defined_covariance() -> ExplorerError {
    ExplorerError::ComputationError(
        "ill-defined empirical covariance; try fewer components or a larger reg_covar".to_string(),
    )
}

/// Responsibilities and mean log-likelihood under the current parameters
fn e_step(
    z: &Array2<f64>,
    weights: &Array1<f64>,
    means: &Array2<f64>,
    covariances: &[Array2<f64>],
) -> Result<(Array2<f64>, f64)> {
    let factors: Vec<(Array2<f64>, f64)> = covariances
        .iter()
        .map(|cov| {
            let l = cholesky(cov).ok_or_else(ill_defined_covariance)?;
            let log_det = log_det_from_cholesky(&l);
            Ok((l, log_det))
        })
        .collect::<Result<_>>()?;

    let rows: Vec<(Vec<f64>, f64)> = (0..z.nrows())
        .into_par_iter()
        .map(|i| {
            let log_probs: Vec<f64> = factors
                .iter()
                .enumerate()
                .map(|(c, (l, log_det))| {
                    let diff = &z.row(i) - &means.row(c);
                    weights[c].ln() + log_gaussian(diff.view(), l, *log_det)
                })
                .collect();
            let norm = log_sum_exp(&log_probs);
            (log_probs.iter().map(|lp| (lp - norm).exp()).collect(), norm)
        })
        .collect();

    let k = weights.len();
    let mut resp = Array2::zeros((z.nrows(), k));
    let mut total = 0.0;
    for (i, (r, norm)) in rows.into_iter().enumerate() {
        for (c, v) in r.into_iter().enumerate() {
            resp[[i, c]] = v;
        }
        total += norm;
    }
    Ok((resp, total / z.nrows() as f64))
}

/// k-means++ seeding followed by a few Lloyd iterations
fn kmeans_labels(z: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let n = z.nrows();
    let sq_dist = |a: ArrayView1<f64>, b: ArrayView1<f64>| -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
    };

    let mut centroids = Array2::zeros((k, z.ncols()));
    let first = (rng.next_u64() as usize) % n;
    centroids.row_mut(0).assign(&z.row(first));

    for c in 1..k {
        let dists: Vec<f64> = (0..n)
            .map(|i| {
                (0..c)
                    .map(|j| sq_dist(z.row(i), centroids.row(j)))
                    .fold(f64::MAX, f64::min)
            })
            .collect();
        let total: f64 = dists.iter().sum();
        let chosen = if total <= 0.0 {
            (rng.next_u64() as usize) % n
        } else {
            let r = (rng.next_u64() as f64 / u64::MAX as f64) * total;
            let mut cumulative = 0.0;
            let mut chosen = n - 1;
            for (i, &d) in dists.iter().enumerate() {
                cumulative += d;
                if cumulative >= r {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        centroids.row_mut(c).assign(&z.row(chosen));
    }

    let assign = |centroids: &Array2<f64>| -> Vec<usize> {
        (0..n)
            .map(|i| {
                (0..k)
                    .map(|c| (c, sq_dist(z.row(i), centroids.row(c))))
                    .fold((0, f64::MAX), |best, cur| if cur.1 < best.1 { cur } else { best })
                    .0
            })
            .collect()
    };

    let mut labels = assign(&centroids);
    for _ in 0..10 {
        let mut sums = Array2::<f64>::zeros(centroids.dim());
        let mut counts = vec![0usize; k];
        for (i, &label) in labels.iter().enumerate() {
            let mut row = sums.row_mut(label);
            row += &z.row(i);
            counts[label] += 1;
        }
        for c in 0..k {
            if counts[c] > 0 {
                centroids.row_mut(c).assign(&(&sums.row(c) / counts[c] as f64));
            }
        }
        let next = assign(&centroids);
        if next == labels {
            break;
        }
        labels = next;
    }
    labels
}

impl Regressor for GaussianMixtureRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (n, p) = x.dim();
        if self.n_components == 0 || self.n_components > n {
            return Err(ExplorerError::InvalidParameter {
                name: "n_components".to_string(),
                value: self.n_components.to_string(),
                reason: format!("must be between 1 and the number of samples ({})", n),
            });
        }

        let mut z = Array2::zeros((n, p + 1));
        z.slice_mut(s![.., ..p]).assign(x);
        z.column_mut(p).assign(y);

        let (weights, means, covariances) = self.fit_mixture(&z)?;

        self.components = (0..self.n_components)
            .map(|c| {
                let cov = &covariances[c];
                let sigma_xx = cov.slice(s![..p, ..p]).to_owned();
                let sigma_xy = cov.slice(s![..p, p]).to_owned();
                let chol_xx = cholesky(&sigma_xx).ok_or_else(ill_defined_covariance)?;
                let coef = cholesky_back_substitute(&chol_xx, &sigma_xy);
                Ok(ConditionalComponent {
                    log_weight: weights[c].ln(),
                    mean_x: means.slice(s![c, ..p]).to_owned(),
                    mean_y: means[[c, p]],
                    log_det_xx: log_det_from_cholesky(&chol_xx),
                    chol_xx,
                    coef,
                })
            })
            .collect::<Result<_>>()?;

        self.n_features = p;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.components.is_empty() {
            return Err(ExplorerError::ModelNotFitted);
        }
        check_predict_width(x, self.n_features)?;

        let preds: Vec<f64> = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| {
                let mut log_resp = Vec::with_capacity(self.components.len());
                let mut cond_means = Vec::with_capacity(self.components.len());
                for comp in &self.components {
                    let diff = &row - &comp.mean_x;
                    log_resp.push(comp.log_weight + log_gaussian(diff.view(), &comp.chol_xx, comp.log_det_xx));
                    cond_means.push(comp.mean_y + comp.coef.dot(&diff));
                }
                let norm = log_sum_exp(&log_resp);
                log_resp
                    .iter()
                    .zip(cond_means.iter())
                    .map(|(lr, m)| (lr - norm).exp() * m)
                    .sum()
            })
            .collect();
        Ok(Array1::from_vec(preds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| ((i * (3 + j * 4)) % 11) as f64 + 0.1 * i as f64);
        let y = x.column(0).mapv(|v| 2.0 * v) - x.column(1) + 1.0;
        (x, y)
    }

    #[test]
    fn test_single_full_component_is_linear_regression() {
        let (x, y) = linear_data();
        let mut model = GaussianMixtureRegressor::new(1, CovarianceType::Full);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-3, "{} vs {}", p, t);
        }
        assert!(model.converged());
    }

    #[test]
    fn test_diag_components_predict_cluster_means() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| if i < 20 { i as f64 * 0.01 } else { 10.0 + i as f64 * 0.01 });
        let y = x.column(0).mapv(|v| if v < 5.0 { -3.0 } else { 3.0 });
        let mut model = GaussianMixtureRegressor::new(2, CovarianceType::Diag);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!((pred[0] + 3.0).abs() < 1e-2);
        assert!((pred[39] - 3.0).abs() < 1e-2);
    }

    #[test]
    fn test_all_covariance_types_fit() {
        let (x, y) = linear_data();
        for cov in ["full", "tied", "diag", "spherical"] {
            let mut model = GaussianMixtureRegressor::new(3, cov.parse().unwrap());
            model.fit(&x, &y).unwrap();
            let pred = model.predict(&x).unwrap();
            assert!(pred.iter().all(|p| p.is_finite()), "{}", cov);
        }
    }

    #[test]
    fn test_too_many_components() {
        let (x, y) = linear_data();
        let mut model = GaussianMixtureRegressor::new(61, CovarianceType::Full);
        assert!(matches!(model.fit(&x, &y), Err(ExplorerError::InvalidParameter { .. })));
    }

    #[test]
    fn test_unknown_covariance_type() {
        assert!("banded".parse::<CovarianceType>().is_err());
        assert_eq!("Tied".parse::<CovarianceType>().unwrap(), CovarianceType::Tied);
    }
}
