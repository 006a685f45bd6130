//! Near-constant column removal

use super::config::BERNOULLI_VARIANCE_THRESHOLD;
use ndarray::{Array1, Array2, Axis};

/// Drops columns whose population variance does not exceed a threshold
#[derive(Debug, Clone, Copy)]
pub struct VarianceFilter {
    threshold: f64,
}

impl Default for VarianceFilter {
    fn default() -> Self {
        Self::new(BERNOULLI_VARIANCE_THRESHOLD)
    }
}

impl VarianceFilter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Population variance (ddof 0) of each column
    pub fn variances(x: &Array2<f64>) -> Array1<f64> {
        if x.nrows() == 0 {
            return Array1::zeros(x.ncols());
        }
        x.var_axis(Axis(0), 0.0)
    }

    /// Indices of the columns kept, in column order
    pub fn select(&self, x: &Array2<f64>) -> Vec<usize> {
        Self::variances(x)
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > self.threshold)
            .map(|(i, _)| i)
            .collect()
    }
}
