//! CART regression tree

use super::models::{check_fit_input, check_predict_width, Regressor};
use crate::error::{ExplorerError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Best split found for one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Reduction of the node's sum of squared errors
    gain: f64,
}

/// Sum of squared errors around the mean
fn sse(sum: f64, sq_sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        (sq_sum - sum * sum / count as f64).max(0.0)
    }
}

/// Regression tree grown greedily on squared error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features sampled at each split (all when `None`)
    pub max_features: Option<usize>,
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_regressor()
    }
}

/// Mutable state threaded through one tree build
struct BuildContext<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    rng: ChaCha8Rng,
    importances: Vec<f64>,
}

impl DecisionTree {
    pub fn new_regressor() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: Some(42),
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Sample this many candidate features per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Depth of the fitted tree (0 for a single leaf)
    pub fn depth(&self) -> Option<usize> {
        self.root.as_ref().map(TreeNode::depth)
    }

    /// Fit on the rows named by `indices` (repeats allowed, as in a bootstrap)
    pub(crate) fn fit_indices(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
    ) -> Result<()> {
        check_fit_input(x, y)?;
        if indices.is_empty() {
            return Err(ExplorerError::InvalidInput(
                "cannot grow a tree on zero rows".to_string(),
            ));
        }

        let n_features = x.ncols();
        let mut ctx = BuildContext {
            x,
            y,
            rng: ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(42)),
            importances: vec![0.0; n_features],
        };

        let root = self.build_node(&mut ctx, indices.to_vec(), 0);

        let total: f64 = ctx.importances.iter().sum();
        if total > 0.0 {
            for imp in &mut ctx.importances {
                *imp /= total;
            }
        }

        self.root = Some(root);
        self.n_features = n_features;
        self.feature_importances = Some(Array1::from_vec(ctx.importances));
        Ok(())
    }

    fn build_node(&self, ctx: &mut BuildContext<'_>, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let (sum, sq_sum) = indices
            .iter()
            .fold((0.0, 0.0), |(s, q), &i| (s + ctx.y[i], q + ctx.y[i] * ctx.y[i]));
        let value = sum / n_samples as f64;
        let node_sse = sse(sum, sq_sum, n_samples);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || node_sse <= 1e-12;

        if should_stop {
            return TreeNode::Leaf { value, n_samples };
        }

        let n_features = ctx.x.ncols();
        let features: Vec<usize> = match self.max_features {
            Some(k) if k < n_features => {
                let mut picked = sample(&mut ctx.rng, n_features, k).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..n_features).collect(),
        };

        let Some(best) = self.find_best_split(ctx.x, ctx.y, &indices, &features, node_sse) else {
            return TreeNode::Leaf { value, n_samples };
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| ctx.x[[i, best.feature_idx]] <= best.threshold);

        ctx.importances[best.feature_idx] += best.gain;

        let left = Box::new(self.build_node(ctx, left_idx, depth + 1));
        let right = Box::new(self.build_node(ctx, right_idx, depth + 1));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
        }
    }

    /// Scan each candidate feature in sorted order with running sums
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent_sse: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.min_samples_leaf;

        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut pairs: Vec<(f64, f64)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

                let total_sum: f64 = pairs.iter().map(|p| p.1).sum();
                let total_sq: f64 = pairs.iter().map(|p| p.1 * p.1).sum();

                let mut left_sum = 0.0;
                let mut left_sq = 0.0;
                let mut best: Option<SplitCandidate> = None;

                for pos in 0..n - 1 {
                    let (xv, yv) = pairs[pos];
                    left_sum += yv;
                    left_sq += yv * yv;

                    let left_count = pos + 1;
                    let right_count = n - left_count;
                    if left_count < min_leaf || right_count < min_leaf {
                        continue;
                    }
                    let next_x = pairs[pos + 1].0;
                    if next_x <= xv {
                        continue;
                    }

                    let child_sse = sse(left_sum, left_sq, left_count)
                        + sse(total_sum - left_sum, total_sq - left_sq, right_count);
                    let gain = parent_sse - child_sse;
                    if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                        let mut threshold = (xv + next_x) / 2.0;
                        // midpoint can round up to the right value
                        if threshold >= next_x {
                            threshold = xv;
                        }
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        // first feature wins on ties
        per_feature.into_iter().flatten().fold(None, |acc: Option<SplitCandidate>, cand| {
            match acc {
                Some(a) if a.gain >= cand.gain => Some(a),
                _ => Some(cand),
            }
        })
    }
}

impl Regressor for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(ExplorerError::ModelNotFitted)?;
        check_predict_width(x, self.n_features)?;
        Ok(x.rows().into_iter().map(|row| root.predict_row(row)).collect())
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}
