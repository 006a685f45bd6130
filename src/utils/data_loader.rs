//! Data loading utilities
//!
//! Tables arrive as polars `DataFrame`s; modeling works on dense `ndarray`
//! matrices. The helpers here cover the boundary between the two: reading
//! and writing CSV, dropping incomplete rows, and extracting numeric columns.

use crate::error::{ExplorerError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// CSV reader for input tables
pub struct DataLoader {
    infer_schema_length: Option<usize>,
    separator: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(100),
            separator: b',',
        }
    }

    /// Set the field separator
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ExplorerError::Data(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_separator(self.separator);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        info!(path = %path.display(), rows = df.height(), columns = df.width(), "Loaded table");
        Ok(df)
    }
}

/// CSV writer for result tables
pub struct DataSaver;

impl DataSaver {
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path.as_ref())?;
        CsvWriter::new(&mut file).finish(df)?;
        Ok(())
    }
}

/// Ensure every name exists in the frame
pub fn require_columns(df: &DataFrame, names: &[String], role: &str) -> Result<()> {
    for name in names {
        if df.column(name).is_err() {
            return Err(ExplorerError::InvalidInput(format!(
                "{} column '{}' not found",
                role, name
            )));
        }
    }
    Ok(())
}

/// Columns that are neither the target nor hidden, in table order
pub fn feature_columns(df: &DataFrame, target: &str, hidden: &[String]) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .filter(|name| name != target && !hidden.contains(name))
        .collect()
}

/// Strictly cast a column to `f64`, keeping nulls as `None`
fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| ExplorerError::InvalidInput(format!("column '{}' not found", name)))?;
    let cast = column.strict_cast(&DataType::Float64).map_err(|e| {
        ExplorerError::InvalidInput(format!("column '{}' is not numeric: {}", name, e))
    })?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Drop every row holding a null in any of `passthrough`, or a null/NaN in
/// any of `numeric`. Row order is preserved.
pub fn drop_incomplete_rows(
    df: &DataFrame,
    passthrough: &[String],
    numeric: &[String],
) -> Result<DataFrame> {
    let mut keep = vec![true; df.height()];

    for name in passthrough {
        let column = df
            .column(name)
            .map_err(|_| ExplorerError::InvalidInput(format!("column '{}' not found", name)))?;
        let nulls = column.as_materialized_series().is_null();
        for (flag, is_null) in keep.iter_mut().zip(nulls.into_iter()) {
            if is_null.unwrap_or(false) {
                *flag = false;
            }
        }
    }

    for name in numeric {
        let values = numeric_values(df, name)?;
        for (flag, value) in keep.iter_mut().zip(values) {
            if !matches!(value, Some(v) if !v.is_nan()) {
                *flag = false;
            }
        }
    }

    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped == 0 {
        return Ok(df.clone());
    }

    debug!(dropped, remaining = df.height() - dropped, "Dropped incomplete rows");
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}

/// Extract numeric columns into a row-major matrix
pub fn columns_to_array2(df: &DataFrame, names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data: Vec<Vec<f64>> = names
        .iter()
        .map(|name| {
            Ok(numeric_values(df, name)?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect())
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, names.len()), |(r, c)| col_data[c][r]))
}

/// Extract one numeric column
pub fn column_to_array1(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    Ok(numeric_values(df, name)?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df! {
            "id" => &[Some("a"), Some("b"), None, Some("d")],
            "x1" => &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
            "x2" => &[Some(10.0), None, Some(30.0), Some(40.0)],
            "y" => &[1.5, 2.5, f64::NAN, 4.5],
        }
        .unwrap()
    }

    #[test]
    fn test_drop_incomplete_rows() {
        let df = sample();
        let clean = drop_incomplete_rows(
            &df,
            &["id".to_string()],
            &["x1".to_string(), "x2".to_string(), "y".to_string()],
        )
        .unwrap();
        assert_eq!(clean.height(), 2);
        let y = column_to_array1(&clean, "y").unwrap();
        assert_eq!(y.to_vec(), vec![1.5, 4.5]);
    }

    #[test]
    fn test_columns_to_array2() {
        let df = sample();
        let x = columns_to_array2(&df, &["x1".to_string()]).unwrap();
        assert_eq!(x.shape(), &[4, 1]);
        assert_eq!(x[[3, 0]], 4.0);
    }

    #[test]
    fn test_non_numeric_column_is_invalid_input() {
        let df = sample();
        let err = columns_to_array2(&df, &["id".to_string()]).unwrap_err();
        assert!(matches!(err, ExplorerError::InvalidInput(_)));
    }

    #[test]
    fn test_feature_columns_excludes_target_and_hidden() {
        let df = sample();
        let features = feature_columns(&df, "y", &["id".to_string()]);
        assert_eq!(features, vec!["x1".to_string(), "x2".to_string()]);
        assert!(require_columns(&df, &["missing".to_string()], "target").is_err());
    }

    #[test]
    fn test_csv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let mut df = df! {
            "a" => &[1.0, 2.0, 3.0],
            "b" => &[4.0, 5.0, 6.0],
        }
        .unwrap();
        DataSaver::save_csv(&mut df, &path).unwrap();
        let loaded = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(loaded.shape(), (3, 2));
    }
}
