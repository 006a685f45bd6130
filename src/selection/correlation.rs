//! Greedy pruning of highly correlated columns

use super::config::DEFAULT_CORRELATION_THRESHOLD;
use ndarray::{Array2, Axis};
use tracing::debug;

/// Absolute Pearson correlation matrix with a zeroed diagonal.
/// A constant column correlates 0 with everything.
pub fn abs_correlation_matrix(x: &Array2<f64>) -> Array2<f64> {
    let n_cols = x.ncols();
    let mut z = x.to_owned();
    if let Some(means) = x.mean_axis(Axis(0)) {
        z -= &means.insert_axis(Axis(0));
    }
    for mut col in z.columns_mut() {
        let norm = col.dot(&col).sqrt();
        if norm > 0.0 && norm.is_finite() {
            col /= norm;
        } else {
            col.fill(0.0);
        }
    }

    let mut corr = z.t().dot(&z).mapv(|v| v.abs().min(1.0));
    for i in 0..n_cols {
        corr[[i, i]] = 0.0;
    }
    corr
}

/// Repeatedly removes one column of the most correlated pair until every
/// surviving pair sits below the threshold
#[derive(Debug, Clone, Copy)]
pub struct CorrelationPruner {
    threshold: f64,
}

impl Default for CorrelationPruner {
    fn default() -> Self {
        Self::new(DEFAULT_CORRELATION_THRESHOLD)
    }
}

impl CorrelationPruner {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Indices of the columns kept, in column order.
    ///
    /// Each round scans the surviving columns in order. The "query" is the
    /// first column whose largest correlation is the overall maximum; the
    /// "target" is the first row of the query column reaching it. The target
    /// is deleted when the query's correlation sum is not larger than the
    /// target's, otherwise the query is.
    pub fn select(&self, x: &Array2<f64>) -> Vec<usize> {
        let corr = abs_correlation_matrix(x);
        let mut active: Vec<usize> = (0..x.ncols()).collect();

        while active.len() > 1 {
            let column_max = |c: usize| active.iter().map(|&r| corr[[r, c]]).fold(0.0, f64::max);

            let mut query = 0;
            let mut max_corr = f64::NEG_INFINITY;
            for (pos, &c) in active.iter().enumerate() {
                let m = column_max(c);
                if m > max_corr {
                    max_corr = m;
                    query = pos;
                }
            }
            if max_corr < self.threshold {
                break;
            }

            let q = active[query];
            let target = active
                .iter()
                .position(|&r| corr[[r, q]] == max_corr)
                .unwrap_or(query);
            let t = active[target];

            let column_sum = |c: usize| active.iter().map(|&r| corr[[r, c]]).sum::<f64>();
            let delete = if column_sum(q) <= column_sum(t) { target } else { query };

            debug!(
                kept = active[if delete == target { query } else { target }],
                removed = active[delete],
                correlation = max_corr,
                "Pruned correlated column"
            );
            active.remove(delete);
        }

        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    /// Four columns: `a` and `b` nearly identical, `c` and `d` unrelated
    fn four_columns() -> Array2<f64> {
        let n = 40;
        let a: Array1<f64> = Array1::from_shape_fn(n, |i| i as f64);
        let b = a.mapv(|v| v * 2.0 + if (v as usize) % 2 == 0 { 0.3 } else { -0.3 });
        let c = Array1::from_shape_fn(n, |i| ((i * 7) % 11) as f64);
        let d = Array1::from_shape_fn(n, |i| ((i * 5) % 3) as f64 - ((i * 3) % 7) as f64);
        let mut x = Array2::zeros((n, 4));
        x.column_mut(0).assign(&a);
        x.column_mut(1).assign(&b);
        x.column_mut(2).assign(&c);
        x.column_mut(3).assign(&d);
        x
    }

    #[test]
    fn test_correlation_matrix() {
        let x = array![[1.0, 2.0, 5.0], [2.0, 4.0, 5.0], [3.0, 6.0, 5.0]];
        let corr = abs_correlation_matrix(&x);
        assert!((corr[[0, 1]] - 1.0).abs() < 1e-12);
        assert_eq!(corr[[0, 0]], 0.0);
        // constant column
        assert_eq!(corr[[0, 2]], 0.0);
        assert_eq!(corr[[2, 1]], 0.0);
    }

    #[test]
    fn test_prunes_one_of_redundant_pair_deterministically() {
        let x = four_columns();
        let corr = abs_correlation_matrix(&x);
        let above: usize = (0..4)
            .flat_map(|i| (i + 1..4).map(move |j| (i, j)))
            .filter(|&(i, j)| corr[[i, j]] >= 0.95)
            .count();
        assert_eq!(above, 1);

        let pruner = CorrelationPruner::default();
        let first = pruner.select(&x);
        assert_eq!(first.len(), 3);
        assert!(first.contains(&2) && first.contains(&3));
        for _ in 0..5 {
            assert_eq!(pruner.select(&x), first);
        }
    }

    #[test]
    fn test_survivors_below_threshold() {
        let x = Array2::from_shape_fn((30, 8), |(i, j)| {
            let base = i as f64;
            match j % 3 {
                0 => base + j as f64 * 0.01,
                1 => (base * 0.7 + j as f64).sin(),
                _ => ((i * (j + 3)) % 13) as f64,
            }
        });
        let pruner = CorrelationPruner::new(0.95);
        let kept = pruner.select(&x);
        assert!(!kept.is_empty());
        let reduced = x.select(Axis(1), &kept);
        let corr = abs_correlation_matrix(&reduced);
        assert!(corr.iter().all(|&v| v < 0.95));
    }

    #[test]
    fn test_deletes_column_with_larger_footprint() {
        // x0 and x1 are near-copies; x1 also carries part of x2
        let n = 44;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| {
            let t = i as f64;
            let z = ((i * 7) % 11) as f64 - 5.0;
            match j {
                0 => t,
                1 => t + 0.5 * z,
                _ => z,
            }
        });
        let corr = abs_correlation_matrix(&x);
        assert!(corr[[0, 1]] >= 0.95);
        assert!(corr[[0, 2]] < 0.95 && corr[[1, 2]] < 0.95);
        let footprint = |j: usize| corr.column(j).sum();
        assert!(footprint(1) > footprint(0));

        let kept = CorrelationPruner::new(0.95).select(&x);
        assert_eq!(kept, vec![0, 2]);
    }
}
