//! Boruta: all-relevant feature selection with shadow features
//!
//! Each iteration appends a permuted copy of every feature still in play,
//! fits a random forest on the widened matrix and counts a "hit" for every
//! real feature whose importance beats a percentile of the shadow
//! importances. Binomial tests on the hit counts confirm or reject features
//! until none remain undecided or the iteration cap is reached.

use super::config::{BorutaConfig, BorutaEstimators};
use crate::error::{ExplorerError, Result};
use crate::training::{MaxFeatures, RandomForest, Regressor};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Minimum number of shadow columns per iteration
const MIN_SHADOWS: usize = 5;

/// Final status of one feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureDecision {
    Confirmed,
    Tentative,
    Rejected,
}

/// Outcome of a Boruta run, indexed like the input columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorutaReport {
    pub decisions: Vec<FeatureDecision>,
    /// Hits accumulated per feature
    pub hits: Vec<usize>,
    /// Value of the iteration counter when the loop stopped
    pub n_iterations: usize,
    /// Shadow-importance percentile of each iteration
    pub shadow_thresholds: Vec<f64>,
}

impl BorutaReport {
    fn indices_with(&self, decision: FeatureDecision) -> Vec<usize> {
        self.decisions
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == decision)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn confirmed(&self) -> Vec<usize> {
        self.indices_with(FeatureDecision::Confirmed)
    }

    pub fn tentative(&self) -> Vec<usize> {
        self.indices_with(FeatureDecision::Tentative)
    }

    pub fn rejected(&self) -> Vec<usize> {
        self.indices_with(FeatureDecision::Rejected)
    }
}

/// Internal decision register: 1 confirmed, 0 undecided, -1 rejected
type DecisionRegister = Vec<i8>;

#[derive(Debug, Clone)]
pub struct Boruta {
    config: BorutaConfig,
}

impl Default for Boruta {
    fn default() -> Self {
        Self::new(BorutaConfig::default())
    }
}

impl Boruta {
    pub fn new(config: BorutaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BorutaConfig {
        &self.config
    }

    /// Trees per forest for `n_features` features still in play
    fn tree_count(&self, n_features: usize) -> usize {
        match self.config.n_estimators {
            BorutaEstimators::Fixed(n) => n,
            BorutaEstimators::Auto => {
                let doubled = (2 * n_features) as f64;
                let multi = doubled / (doubled.sqrt() * self.config.max_depth as f64);
                ((multi * 100.0) as usize).max(1)
            }
        }
    }

    /// Run the test and return the per-feature decisions
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<BorutaReport> {
        self.config.validate()?;
        let n_features = x.ncols();
        if n_features == 0 {
            return Err(ExplorerError::NoFeaturesRemain {
                step: "boruta".to_string(),
            });
        }
        if x.nrows() != y.len() {
            return Err(ExplorerError::sample_mismatch(x.nrows(), y.len()));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        let mut dec_reg: DecisionRegister = vec![0; n_features];
        let mut hit_reg = vec![0usize; n_features];
        let mut shadow_thresholds = Vec::new();

        let mut iter = 1usize;
        while dec_reg.contains(&0) && iter < self.config.max_iter {
            let in_play: Vec<usize> = (0..n_features).filter(|&i| dec_reg[i] >= 0).collect();
            let (real_imp, shadow_imp) = self.importances(x, y, &in_play, iter, &mut rng)?;

            let threshold = percentile(&shadow_imp, self.config.perc);
            shadow_thresholds.push(threshold);
            for (&feature, &imp) in in_play.iter().zip(real_imp.iter()) {
                if imp > threshold {
                    hit_reg[feature] += 1;
                }
            }

            self.do_tests(&mut dec_reg, &hit_reg, iter);
            debug!(
                iteration = iter,
                confirmed = dec_reg.iter().filter(|&&d| d == 1).count(),
                tentative = dec_reg.iter().filter(|&&d| d == 0).count(),
                rejected = dec_reg.iter().filter(|&&d| d == -1).count(),
                "Boruta iteration"
            );
            iter += 1;
        }

        let decisions: Vec<FeatureDecision> = dec_reg
            .iter()
            .map(|&d| match d {
                1 => FeatureDecision::Confirmed,
                -1 => FeatureDecision::Rejected,
                _ => FeatureDecision::Tentative,
            })
            .collect();

        let report = BorutaReport {
            decisions,
            hits: hit_reg,
            n_iterations: iter,
            shadow_thresholds,
        };
        info!(
            iterations = iter,
            confirmed = report.confirmed().len(),
            tentative = report.tentative().len(),
            rejected = report.rejected().len(),
            "Boruta finished"
        );
        Ok(report)
    }

    /// Fit a forest on `[in_play | shadows]`, returning the importances of
    /// the real columns and of the shadows
    fn importances(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        in_play: &[usize],
        iter: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let x_cur = x.select(Axis(1), in_play);

        let mut shadow = x_cur.clone();
        while shadow.ncols() < MIN_SHADOWS {
            shadow = ndarray::concatenate(Axis(1), &[shadow.view(), shadow.view()])?;
        }
        let n_rows = shadow.nrows();
        for mut col in shadow.columns_mut() {
            let mut order: Vec<usize> = (0..n_rows).collect();
            order.shuffle(rng);
            let permuted: Array1<f64> = order.iter().map(|&i| col[i]).collect();
            col.assign(&permuted);
        }

        let widened = ndarray::concatenate(Axis(1), &[x_cur.view(), shadow.view()])?;
        let mut forest = RandomForest::new_regressor(self.tree_count(in_play.len()))
            .with_max_depth(self.config.max_depth)
            .with_max_features(MaxFeatures::All)
            .with_bootstrap(true)
            .with_random_state(self.config.random_state.wrapping_add(iter as u64));
        forest
            .fit(&widened, y)
            .map_err(|e| ExplorerError::fit_failure("boruta", None, e))?;

        let imp = forest.feature_importances().ok_or_else(|| ExplorerError::FitFailure {
            step: "boruta".to_string(),
            strategy: None,
            reason: "forest produced no importances".to_string(),
        })?;
        let imp: Vec<f64> = imp.iter().map(|v| if v.is_nan() { 0.0 } else { *v }).collect();
        let (real, shadows) = imp.split_at(in_play.len());
        Ok((real.to_vec(), shadows.to_vec()))
    }

    /// Update undecided features from the hit counts after `iter` trials
    fn do_tests(&self, dec_reg: &mut DecisionRegister, hit_reg: &[usize], iter: usize) {
        let active: Vec<usize> = (0..dec_reg.len()).filter(|&i| dec_reg[i] >= 0).collect();
        let cdf = binomial_half_cdf(iter);
        // P(X >= h) for acceptance, P(X <= h) for rejection
        let accept_p: Vec<f64> = active
            .iter()
            .map(|&i| {
                let h = hit_reg[i].min(iter);
                if h == 0 { 1.0 } else { 1.0 - cdf[h - 1] }
            })
            .collect();
        let reject_p: Vec<f64> = active.iter().map(|&i| cdf[hit_reg[i].min(iter)]).collect();

        let alpha = self.config.alpha;
        let mut accept = fdr_correction(&accept_p, alpha);
        let mut reject = fdr_correction(&reject_p, alpha);
        if self.config.two_step {
            let bonferroni = alpha / iter as f64;
            for k in 0..active.len() {
                accept[k] = accept[k] && accept_p[k] <= bonferroni;
                reject[k] = reject[k] && reject_p[k] <= bonferroni;
            }
        }

        for (k, &feature) in active.iter().enumerate() {
            if dec_reg[feature] != 0 {
                continue;
            }
            if accept[k] {
                dec_reg[feature] = 1;
            } else if reject[k] {
                dec_reg[feature] = -1;
            }
        }
    }
}

/// Cumulative distribution of Binomial(n, 0.5) at 0..=n
fn binomial_half_cdf(n: usize) -> Vec<f64> {
    let mut pmf = 0.5f64.powi(n as i32);
    let mut cumulative = 0.0;
    let mut cdf = Vec::with_capacity(n + 1);
    for k in 0..=n {
        cumulative += pmf;
        cdf.push(cumulative.min(1.0));
        pmf *= (n - k) as f64 / (k + 1) as f64;
    }
    cdf
}

/// Benjamini-Hochberg: which hypotheses are rejected at level `alpha`
fn fdr_correction(p_values: &[f64], alpha: f64) -> Vec<bool> {
    let m = p_values.len();
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let last = order
        .iter()
        .enumerate()
        .filter(|(rank, &i)| p_values[i] <= (rank + 1) as f64 / m as f64 * alpha)
        .map(|(rank, _)| rank)
        .last();

    let mut rejected = vec![false; m];
    if let Some(last) = last {
        for &i in &order[..=last] {
            rejected[i] = true;
        }
    }
    rejected
}

/// Linear-interpolation percentile, `q` in [0, 100]
fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_matches_linear_interpolation() {
        let v = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 100.0), 5.0);
        assert_eq!(percentile(&v, 50.0), 3.0);
        assert!((percentile(&v, 70.0) - 3.8).abs() < 1e-12);
    }

    #[test]
    fn test_binomial_cdf() {
        let cdf = binomial_half_cdf(3);
        assert!((cdf[0] - 0.125).abs() < 1e-12);
        assert!((cdf[1] - 0.5).abs() < 1e-12);
        assert!((cdf[3] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fdr_correction_step_up() {
        // Sorted thresholds at alpha 0.05, m 4: 0.0125, 0.025, 0.0375, 0.05
        let p = [0.036, 0.001, 0.02, 0.2];
        assert_eq!(fdr_correction(&p, 0.05), vec![true, true, true, false]);
        assert_eq!(fdr_correction(&[0.5, 0.9], 0.05), vec![false, false]);
        // 0.04 misses its own rank threshold but is carried by a later pass
        assert_eq!(fdr_correction(&[0.04, 0.045], 0.05), vec![true, true]);
    }

    #[test]
    fn test_auto_tree_count() {
        let boruta = Boruta::default();
        // 2n / (sqrt(2n) * 5) * 100 with n = 8 gives 4 / 5 * 100
        assert_eq!(boruta.tree_count(8), 80);
        assert_eq!(boruta.tree_count(1), 28);
    }

    #[test]
    fn test_confirms_signal_and_rejects_noise() {
        let n = 120;
        let x = Array2::from_shape_fn((n, 4), |(i, j)| match j {
            0 => (i % 10) as f64,
            1 => ((i * 7) % 13) as f64,
            2 => ((i * 31 + 7) % 17) as f64,
            _ => ((i * 11 + 3) % 19) as f64,
        });
        let y = x.column(0).mapv(|v| 3.0 * v) + x.column(1);

        let boruta = Boruta::new(
            BorutaConfig::default()
                .with_max_iter(30)
                .with_n_estimators(BorutaEstimators::Fixed(30)),
        );
        let report = boruta.fit(&x, &y).unwrap();
        assert_eq!(report.decisions[0], FeatureDecision::Confirmed);
        assert_eq!(report.decisions.len(), 4);
        assert!(report.n_iterations <= 30);
        assert!(report.confirmed().iter().all(|&i| i < 4));
    }

    #[test]
    fn test_empty_input() {
        let x = Array2::<f64>::zeros((10, 0));
        let y = Array1::zeros(10);
        assert!(matches!(
            Boruta::default().fit(&x, &y),
            Err(ExplorerError::NoFeaturesRemain { .. })
        ));
    }
}
