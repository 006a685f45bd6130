//! Utility functions and types

pub mod data_loader;

pub use data_loader::{
    column_to_array1, columns_to_array2, drop_incomplete_rows, feature_columns, require_columns,
    DataLoader, DataSaver,
};

use ndarray::{Array1, Array2, Axis};

/// Gather rows of a matrix by index
pub fn take_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(0), indices)
}

/// Gather elements of a vector by index
pub fn take_elems(y: &Array1<f64>, indices: &[usize]) -> Array1<f64> {
    y.select(Axis(0), indices)
}

/// Gather columns of a matrix by index
pub fn take_cols(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(1), indices)
}
