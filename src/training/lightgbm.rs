//! LightGBM-style gradient boosting with leaf-wise tree growth
//!
//! Differences from the depth-wise booster in `xgboost`:
//! - Leaf-wise (best-first) growth bounded by `num_leaves`
//! - Bagging only when `subsample_freq > 0`, redrawn every `subsample_freq` rounds

use super::models::{check_fit_input, check_predict_width, Regressor};
use super::xgboost::{best_split_for_feature, compute_leaf_weight, split_count_importances, subsample, BoostNode};
use crate::error::{ExplorerError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Maximum number of leaves per tree
    pub num_leaves: usize,
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    /// Minimum hessian sum per leaf
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub subsample: f64,
    /// Bagging period in rounds; 0 disables bagging
    pub subsample_freq: usize,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            min_child_weight: 1e-3,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
            subsample: 1.0,
            subsample_freq: 0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

impl LightGBMConfig {
    fn validate(&self) -> Result<()> {
        if self.num_leaves < 2 {
            return Err(ExplorerError::InvalidParameter {
                name: "num_leaves".to_string(),
                value: self.num_leaves.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        for (name, value) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ExplorerError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be in (0, 1]".to_string(),
                });
            }
        }
        Ok(())
    }
}

struct PendingSplit {
    gain: f64,
    node_id: usize,
    feature: usize,
    threshold: f64,
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for PendingSplit {}
impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingSplit {
    // Highest gain first; earlier nodes win ties
    fn cmp(&self, other: &Self) -> Ordering {
        self.gain
            .total_cmp(&other.gain)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

enum NodeSlot {
    Leaf(Vec<usize>),
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

fn best_split(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    config: &LightGBMConfig,
) -> Option<(usize, f64, f64)> {
    if indices.len() < 2 * config.min_child_samples.max(1) {
        return None;
    }
    feature_indices
        .par_iter()
        .filter_map(|&f| {
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
        .collect::<Vec<_>>()
        .into_iter()
        .fold(None, |acc: Option<(usize, f64, f64)>, c| match acc {
            Some(a) if a.2 >= c.2 => Some(a),
            _ => Some(c),
        })
}

/// Build a tree using leaf-wise (best-first) growth
fn build_leafwise_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    config: &LightGBMConfig,
) -> BoostNode {
    let max_depth = config.max_depth.unwrap_or(usize::MAX);
    let mut nodes: Vec<NodeSlot> = vec![NodeSlot::Leaf(indices.to_vec())];
    let mut depths: Vec<usize> = vec![0];
    let mut heap: BinaryHeap<PendingSplit> = BinaryHeap::new();

    if let Some((feature, threshold, gain)) = best_split(x, grad, hess, indices, feature_indices, config) {
        heap.push(PendingSplit { gain, node_id: 0, feature, threshold });
    }

    let mut n_leaves = 1usize;
    while n_leaves < config.num_leaves {
        let split = match heap.pop() {
            Some(s) if s.gain > 0.0 => s,
            _ => break,
        };

        let rows = match std::mem::replace(&mut nodes[split.node_id], NodeSlot::Leaf(Vec::new())) {
            NodeSlot::Leaf(rows) => rows,
            slot => {
                nodes[split.node_id] = slot;
                continue;
            }
        };
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&i| x[[i, split.feature]] <= split.threshold);

        let depth = depths[split.node_id];
        let left_id = nodes.len();
        let right_id = left_id + 1;

        if depth + 1 < max_depth {
            for (child_id, child_rows) in [(left_id, &left_rows), (right_id, &right_rows)] {
                if let Some((feature, threshold, gain)) =
                    best_split(x, grad, hess, child_rows, feature_indices, config)
                {
                    heap.push(PendingSplit { gain, node_id: child_id, feature, threshold });
                }
            }
        }

        nodes.push(NodeSlot::Leaf(left_rows));
        nodes.push(NodeSlot::Leaf(right_rows));
        depths.push(depth + 1);
        depths.push(depth + 1);
        nodes[split.node_id] = NodeSlot::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        n_leaves += 1;
    }

    to_node(&nodes, 0, grad, hess, config)
}

fn to_node(
    nodes: &[NodeSlot],
    idx: usize,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    config: &LightGBMConfig,
) -> BoostNode {
    match &nodes[idx] {
        NodeSlot::Leaf(rows) => {
            let g: f64 = rows.iter().map(|&i| grad[i]).sum();
            let h: f64 = rows.iter().map(|&i| hess[i]).sum();
            BoostNode::Leaf {
                weight: compute_leaf_weight(g, h, config.reg_lambda, config.reg_alpha),
            }
        }
        NodeSlot::Split { feature, threshold, left, right } => BoostNode::Split {
            feature: *feature,
            threshold: *threshold,
            left: Box::new(to_node(nodes, *left, grad, hess, config)),
            right: Box::new(to_node(nodes, *right, grad, hess, config)),
        },
    }
}

// ============ LightGBM Regressor ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMRegressor {
    config: LightGBMConfig,
    trees: Vec<BoostNode>,
    base_prediction: f64,
    n_features: usize,
}

impl Default for LightGBMRegressor {
    fn default() -> Self {
        Self::new(LightGBMConfig::default())
    }
}

impl LightGBMRegressor {
    pub fn new(config: LightGBMConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &LightGBMConfig {
        &self.config
    }
}

impl Regressor for LightGBMRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.config.validate()?;
        let (n, n_features) = x.dim();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        self.base_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n, self.base_prediction);
        let hessians = Array1::from_elem(n, 1.0);

        let mut bag: Vec<usize> = (0..n).collect();
        self.trees.clear();

        for round in 0..self.config.n_estimators {
            let gradients: Array1<f64> = &predictions - y;

            let freq = self.config.subsample_freq;
            if freq > 0 && self.config.subsample < 1.0 && round % freq == 0 {
                bag = subsample(&mut rng, n, self.config.subsample);
            }
            let features = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = build_leafwise_tree(x, &gradients, &hessians, &bag, &features, &self.config);
            for (i, p) in predictions.iter_mut().enumerate() {
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
            .map(|row| self.base_prediction + lr * self.trees.iter().map(|t| t.predict(row)).sum::<f64>())
            .collect())
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 {
            return None;
        }
        Some(split_count_importances(&self.trees, self.n_features))
    }
}
