//! Search result records

use crate::error::Result;
use crate::strategy::HyperParams;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Metrics and predictions from one model search.
///
/// Nested searches leave the prediction sequences and `best_params` empty,
/// since no single final model exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub strategy: String,
    /// Feature columns the model was trained on
    pub features: Vec<String>,
    pub train_r2: f64,
    pub train_mae: f64,
    pub train_rmse: f64,
    pub test_r2: f64,
    pub test_mae: f64,
    pub test_rmse: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_predict_train: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_train: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_predict: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_test: Option<Vec<f64>>,
    /// Unprefixed regressor parameters, ready to pass back to `predict`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_params: Option<HyperParams>,
}

impl SearchResult {
    pub fn is_nested(&self) -> bool {
        self.y_predict.is_none()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One row of a multi-strategy comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub model: String,
    pub train_r2: f64,
    pub train_mae: f64,
    pub train_rmse: f64,
    pub test_r2: f64,
    pub test_mae: f64,
    pub test_rmse: f64,
    pub seconds: f64,
}

impl ModelComparison {
    pub fn from_result(result: &SearchResult, seconds: f64) -> Self {
        Self {
            model: result.strategy.clone(),
            train_r2: result.train_r2,
            train_mae: result.train_mae,
            train_rmse: result.train_rmse,
            test_r2: result.test_r2,
            test_mae: result.test_mae,
            test_rmse: result.test_rmse,
            seconds,
        }
    }
}

/// Render comparison rows as a table, one row per strategy
pub fn comparison_to_dataframe(rows: &[ModelComparison]) -> Result<DataFrame> {
    let column = |f: fn(&ModelComparison) -> f64| rows.iter().map(f).collect::<Vec<f64>>();
    let models: Vec<&str> = rows.iter().map(|r| r.model.as_str()).collect();

    let df = df! {
        "model" => models,
        "train_r2" => column(|r| r.train_r2),
        "train_mae" => column(|r| r.train_mae),
        "train_rmse" => column(|r| r.train_rmse),
        "test_r2" => column(|r| r.test_r2),
        "test_mae" => column(|r| r.test_mae),
        "test_rmse" => column(|r| r.test_rmse),
        "seconds" => column(|r| r.seconds),
    }?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ParamValue;

    fn nested_result() -> SearchResult {
        SearchResult {
            strategy: "OLS".to_string(),
            features: vec!["a".to_string()],
            train_r2: 0.9,
            train_mae: 0.1,
            train_rmse: 0.2,
            test_r2: 0.8,
            test_mae: 0.15,
            test_rmse: 0.25,
            y_predict_train: None,
            y_train: None,
            y_predict: None,
            y_test: None,
            best_params: None,
        }
    }

    #[test]
    fn test_nested_result_omits_optional_fields() {
        let result = nested_result();
        assert!(result.is_nested());
        let json = result.to_json().unwrap();
        assert!(json.contains("\"test_r2\""));
        assert!(!json.contains("y_predict"));
        assert!(!json.contains("best_params"));
    }

    #[test]
    fn test_best_params_serialize_unprefixed() {
        let mut result = nested_result();
        let mut params = HyperParams::new();
        params.insert("alpha".to_string(), ParamValue::Float(0.5));
        result.best_params = Some(params);
        result.y_predict = Some(vec![1.0]);
        let json = result.to_json().unwrap();
        assert!(json.contains("\"alpha\": 0.5"));

        let back: SearchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.best_params.unwrap()["alpha"], ParamValue::Float(0.5));
        assert!(back.y_test.is_none());
    }

    #[test]
    fn test_comparison_dataframe() {
        let rows = vec![
            ModelComparison::from_result(&nested_result(), 1.5),
            ModelComparison {
                model: "Ridge".to_string(),
                ..ModelComparison::from_result(&nested_result(), 0.5)
            },
        ];
        let df = comparison_to_dataframe(&rows).unwrap();
        assert_eq!(df.shape(), (2, 8));
        let models: Vec<Option<&str>> = df.column("model").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(models, vec![Some("OLS"), Some("Ridge")]);
    }
}
