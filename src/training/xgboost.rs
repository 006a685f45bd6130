//! XGBoost-style gradient boosting with second-order approximation
//!
//! - Regularized leaf weights: w* = -T(G, alpha) / (H + lambda)
//! - Split gain: 0.5 * [T(GL)²/(HL+λ) + T(GR)²/(HR+λ) - T(G)²/(H+λ)] - γ
//! - Row subsampling per round and column subsampling per tree

use super::models::{check_fit_input, check_predict_width, Regressor};
use crate::error::{ExplorerError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// Minimum number of rows in each child
    pub min_child_samples: usize,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    /// Redraw the row sample every this many rounds; 0 redraws every round
    pub subsample_freq: usize,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            min_child_samples: 1,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            subsample_freq: 0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

impl XGBoostConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ExplorerError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be in (0, 1]".to_string(),
                });
            }
        }
        if self.reg_alpha < 0.0 || self.reg_lambda < 0.0 {
            return Err(ExplorerError::InvalidParameter {
                name: "reg_alpha/reg_lambda".to_string(),
                value: format!("{}/{}", self.reg_alpha, self.reg_lambda),
                reason: "must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}

/// A single node in a boosted tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum BoostNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<BoostNode>,
        right: Box<BoostNode>,
    },
}

impl BoostNode {
    pub(crate) fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                BoostNode::Leaf { weight } => return *weight,
                BoostNode::Split { feature, threshold, left, right } => {
                    node = if sample[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub(crate) fn count_splits(&self, counts: &mut [f64]) {
        if let BoostNode::Split { feature, left, right, .. } = self {
            counts[*feature] += 1.0;
            left.count_splits(counts);
            right.count_splits(counts);
        }
    }
}

/// L1 soft threshold on a gradient sum
pub(crate) fn threshold_l1(g: f64, alpha: f64) -> f64 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
pub(crate) fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    -threshold_l1(g_sum, alpha) / (h_sum + lambda)
}

/// Structure score of a node: T(G)² / (H + λ)
pub(crate) fn node_score(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g = threshold_l1(g_sum, alpha);
    g * g / (h_sum + lambda)
}

/// Best split of one feature over `indices`: (threshold, gain)
pub(crate) fn best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    lambda: f64,
    alpha: f64,
    min_child_weight: f64,
    min_child_samples: usize,
) -> Option<(f64, f64)> {
    let mut sorted: Vec<usize> = indices.to_vec();
    sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let g_total: f64 = sorted.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted.iter().map(|&i| hess[i]).sum();
    let parent = node_score(g_total, h_total, lambda, alpha);

    let n = sorted.len();
    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(f64, f64)> = None;

    for pos in 0..n.saturating_sub(1) {
        let idx = sorted[pos];
        g_left += grad[idx];
        h_left += hess[idx];

        let value = x[[idx, feature]];
        let next = x[[sorted[pos + 1], feature]];
        if next <= value {
            continue;
        }

        let left_count = pos + 1;
        if left_count < min_child_samples || n - left_count < min_child_samples {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < min_child_weight || h_right < min_child_weight {
            continue;
        }

        let gain = 0.5
            * (node_score(g_left, h_left, lambda, alpha) + node_score(g_right, h_right, lambda, alpha)
                - parent);
        if best.map_or(true, |(_, g)| gain > g) {
            let mut threshold = (value + next) / 2.0;
            if threshold >= next {
                threshold = value;
            }
            best = Some((threshold, gain));
        }
    }

    best
}

/// Depth-wise tree with exact greedy split finding
fn build_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> BoostNode {
    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();
    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    if depth >= config.max_depth
        || indices.len() < 2 * config.min_child_samples.max(1)
        || h_sum < config.min_child_weight
    {
        return BoostNode::Leaf { weight: leaf_weight };
    }

    let candidates: Vec<Option<(usize, f64, f64)>> = feature_indices
        .par_iter()
        .map(|&f| {
            best_split_for_feature(
                x,
                grad,
                hess,
                indices,
                f,
                config.reg_lambda,
                config.reg_alpha,
                config.min_child_weight,
                config.min_child_samples,
            )
            .map(|(threshold, gain)| (f, threshold, gain))
        })
        .collect();

    let best = candidates
        .into_iter()
        .flatten()
        .fold(None, |acc: Option<(usize, f64, f64)>, c| match acc {
            Some(a) if a.2 >= c.2 => Some(a),
            _ => Some(c),
        });

    match best {
        Some((feature, threshold, gain)) if gain > config.gamma && gain > 0.0 => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            let left = build_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);
            BoostNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => BoostNode::Leaf { weight: leaf_weight },
    }
}

/// Draw `ceil(ratio * n)` sorted indices without replacement
pub(crate) fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let size = ((n as f64 * ratio).ceil() as usize).clamp(1, n);
    let mut indices = rand::seq::index::sample(rng, n, size).into_vec();
    indices.sort_unstable();
    indices
}

/// Normalized split-count importances
pub(crate) fn split_count_importances(trees: &[BoostNode], n_features: usize) -> Array1<f64> {
    let mut counts = vec![0.0f64; n_features];
    for tree in trees {
        tree.count_splits(&mut counts);
    }
    let total: f64 = counts.iter().sum();
    if total > 0.0 {
        for c in counts.iter_mut() {
            *c /= total;
        }
    }
    Array1::from_vec(counts)
}

/// XGBoost Regressor (squared error loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    config: XGBoostConfig,
    trees: Vec<BoostNode>,
    base_score: f64,
    n_features: usize,
}

impl Default for XGBoostRegressor {
    fn default() -> Self {
        Self::new(XGBoostConfig::default())
    }
}

impl XGBoostRegressor {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }
}

impl Regressor for XGBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.config.validate()?;
        let (n_samples, n_features) = x.dim();

        self.base_score = y.mean().unwrap_or(0.0);
        let mut preds = Array1::from_elem(n_samples, self.base_score);
        let hess = Array1::from_elem(n_samples, 1.0);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        let mut row_indices: Vec<usize> = (0..n_samples).collect();

        for round in 0..self.config.n_estimators {
            // Squared error: grad = pred - y, hess = 1
            let grad: Array1<f64> = &preds - y;

            let freq = self.config.subsample_freq;
            if freq == 0 || round % freq == 0 {
                row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            }
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = build_tree(x, &grad, &hess, &row_indices, &col_indices, 0, &self.config);

            for (i, p) in preds.iter_mut().enumerate() {
                *p += self.config.learning_rate * tree.predict(x.row(i));
            }
            self.trees.push(tree);
        }

        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 {
            return Err(ExplorerError::ModelNotFitted);
        }
        check_predict_width(x, self.n_features)?;

        let lr = self.config.learning_rate;
        Ok(x
            .rows()
            .into_iter()
            .map(|row| self.base_score + lr * self.trees.iter().map(|t| t.predict(row)).sum::<f64>())
            .collect())
    }

    /// Split-count importances across all trees
    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 {
            return None;
        }
        Some(split_count_importances(&self.trees, self.n_features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| ((i * (j + 2) + j) % 13) as f64);
        let y = x.column(0).mapv(|v| v * v * 0.2) - x.column(1);
        (x, y)
    }

    #[test]
    fn test_xgboost_regressor() {
        let (x, y) = data();
        let mut model = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 50,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        let r2 = crate::training::r2_score(&y, &pred).unwrap();
        assert!(r2 > 0.95, "r2 = {}", r2);
    }

    #[test]
    fn test_leaf_weight_l1() {
        assert_eq!(compute_leaf_weight(0.05, 10.0, 1.0, 0.1), 0.0);
        assert!((compute_leaf_weight(-2.0, 3.0, 1.0, 0.0) - 0.5).abs() < 1e-12);
        assert!((compute_leaf_weight(2.1, 2.0, 1.0, 0.1) + 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_child_samples_blocks_small_leaves() {
        let (x, y) = data();
        let mut model = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 1,
            min_child_samples: 31,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        // 60 rows cannot split into two children of 31
        let pred = model.predict(&x).unwrap();
        assert!(pred.iter().all(|p| (p - pred[0]).abs() < 1e-12));
    }

    #[test]
    fn test_subsampling_is_seeded() {
        let (x, y) = data();
        let fit = || {
            let mut m = XGBoostRegressor::new(XGBoostConfig {
                n_estimators: 10,
                subsample: 0.4,
                subsample_freq: 7,
                colsample_bytree: 0.7,
                ..Default::default()
            });
            m.fit(&x, &y).unwrap();
            m.predict(&x).unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_invalid_colsample() {
        let (x, y) = data();
        let mut model = XGBoostRegressor::new(XGBoostConfig {
            colsample_bytree: 0.0,
            ..Default::default()
        });
        assert!(matches!(model.fit(&x, &y), Err(ExplorerError::InvalidParameter { .. })));
    }
}
