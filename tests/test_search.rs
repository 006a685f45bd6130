//! Integration test: model search end-to-end

use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use regression_explorer::search::{comparison_to_dataframe, ModelSearchEngine, SearchConfig};
use regression_explorer::strategy::{HyperParams, ParamValue, RegressionStrategy};
use regression_explorer::training::RegressionMetrics;
use regression_explorer::ExplorerError;

/// `n` rows of five uniform features; the target is linear in the first
/// three plus small noise
fn linear_df(n: usize, seed: u64) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut columns: Vec<Vec<f64>> = (0..5)
        .map(|_| (0..n).map(|_| rng.gen::<f64>() * 10.0).collect())
        .collect();
    let y: Vec<f64> = (0..n)
        .map(|i| {
            5.0 * columns[0][i] - 3.0 * columns[1][i] + 2.0 * columns[2][i]
                + (rng.gen::<f64>() - 0.5) * 0.5
        })
        .collect();
    let x4 = columns.pop().unwrap();
    let x3 = columns.pop().unwrap();
    let x2 = columns.pop().unwrap();
    let x1 = columns.pop().unwrap();
    let x0 = columns.pop().unwrap();
    df!(
        "x0" => x0,
        "x1" => x1,
        "x2" => x2,
        "x3" => x3,
        "x4" => x4,
        "target" => y
    )
    .unwrap()
}

#[test]
fn test_ols_end_to_end() {
    let engine = ModelSearchEngine::new(
        &linear_df(100, 1),
        "target",
        RegressionStrategy::OrdinaryLeastSquares,
        SearchConfig::default(),
    )
    .unwrap();
    let result = engine.predict(None);
    assert!(result.is_ok(), "OLS search should succeed: {:?}", result.err());
    let result = result.unwrap();

    assert!(result.test_r2 > 0.9, "test R² = {}", result.test_r2);
    assert_eq!(result.best_params, Some(HyperParams::new()));
    assert_eq!(result.y_predict.as_ref().unwrap().len(), 20);
    assert_eq!(result.y_test.as_ref().unwrap().len(), 20);
    assert_eq!(result.y_predict_train.as_ref().unwrap().len(), 80);
    assert_eq!(result.features.len(), 5);
}

#[test]
fn test_reported_rmse_matches_predictions() {
    let engine = ModelSearchEngine::new(
        &linear_df(100, 2),
        "target",
        RegressionStrategy::OrdinaryLeastSquares,
        SearchConfig::default(),
    )
    .unwrap();
    let result = engine.predict(None).unwrap();

    let y_test = ndarray::Array1::from(result.y_test.clone().unwrap());
    let y_predict = ndarray::Array1::from(result.y_predict.clone().unwrap());
    let metrics = RegressionMetrics::compute(&y_test, &y_predict).unwrap();
    assert!((metrics.rmse - metrics.mse.sqrt()).abs() < 1e-12);
    assert!((metrics.rmse - result.test_rmse).abs() < 1e-12);

    let perfect = RegressionMetrics::compute(&y_test, &y_test).unwrap();
    assert_eq!(perfect.r2, 1.0);
}

#[test]
fn test_nested_agrees_with_single_evaluation_for_ols() {
    let df = linear_df(100, 3);
    let single = ModelSearchEngine::new(
        &df,
        "target",
        RegressionStrategy::OrdinaryLeastSquares,
        SearchConfig::default(),
    )
    .unwrap()
    .predict(None)
    .unwrap();
    let nested = ModelSearchEngine::new(
        &df,
        "target",
        RegressionStrategy::OrdinaryLeastSquares,
        SearchConfig::default().with_nested(true),
    )
    .unwrap()
    .dcv()
    .unwrap();

    assert!(nested.y_predict.is_none());
    assert!(nested.best_params.is_none());
    assert!(
        (single.test_r2 - nested.test_r2).abs() < 0.01,
        "single {} vs nested {}",
        single.test_r2,
        nested.test_r2
    );
}

#[test]
fn test_best_params_feed_back_into_predict() {
    let engine = ModelSearchEngine::new(
        &linear_df(60, 4),
        "target",
        RegressionStrategy::Lasso,
        SearchConfig::default(),
    )
    .unwrap();
    let tuned = engine.predict(None).unwrap();
    let params = tuned.best_params.clone().unwrap();
    assert!(params.contains_key("alpha"));

    let replayed = engine.predict(Some(&params)).unwrap();
    assert_eq!(replayed.test_r2, tuned.test_r2);
}

#[test]
fn test_preprocessing_keeps_informative_features() {
    let config = SearchConfig::default().with_preprocessing(true);
    let engine = ModelSearchEngine::new(
        &linear_df(100, 5),
        "target",
        RegressionStrategy::OrdinaryLeastSquares,
        config,
    )
    .unwrap();
    assert!(engine.features().contains(&"x0".to_string()));
    assert!(engine.features().len() <= 5);

    let result = engine.predict(None).unwrap();
    assert_eq!(result.features, engine.features());
}

#[test]
fn test_nested_and_preprocessing_rejected() {
    let config = SearchConfig::default().with_nested(true).with_preprocessing(true);
    let result = ModelSearchEngine::new(
        &linear_df(40, 6),
        "target",
        RegressionStrategy::Ridge,
        config,
    );
    assert!(matches!(result, Err(ExplorerError::ConfigError(_))));
}

#[test]
fn test_supplied_unknown_param_is_rejected() {
    let engine = ModelSearchEngine::new(
        &linear_df(40, 7),
        "target",
        RegressionStrategy::Ridge,
        SearchConfig::default(),
    )
    .unwrap();
    let mut params = HyperParams::new();
    params.insert("depth".to_string(), ParamValue::Int(3));
    assert!(matches!(
        engine.predict(Some(&params)),
        Err(ExplorerError::InvalidParameter { .. })
    ));
}

#[test]
fn test_unknown_strategy_name() {
    assert!(matches!(
        RegressionStrategy::from_name("perceptron"),
        Err(ExplorerError::InvalidInput(_))
    ));
    assert_eq!(
        RegressionStrategy::from_name("random_forest").unwrap(),
        RegressionStrategy::RandomForest
    );
}

#[test]
fn test_compare_writes_table() {
    let engine = ModelSearchEngine::new(
        &linear_df(50, 8),
        "target",
        RegressionStrategy::OrdinaryLeastSquares,
        SearchConfig::default(),
    )
    .unwrap();
    let rows = engine
        .compare(&[RegressionStrategy::OrdinaryLeastSquares, RegressionStrategy::PartialLeastSquares])
        .unwrap();
    assert_eq!(rows.len(), 2);

    let mut table = comparison_to_dataframe(&rows).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("comparison.csv");
    regression_explorer::utils::DataSaver::save_csv(&mut table, &path).unwrap();
    let loaded = regression_explorer::utils::DataLoader::new().load_csv(&path).unwrap();
    assert_eq!(loaded.shape(), (2, 8));
}
