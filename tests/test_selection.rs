//! Integration test: feature selection over tables

use ndarray::Array2;
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use regression_explorer::selection::{
    abs_correlation_matrix, BorutaConfig, BorutaEstimators, CorrelationPruner,
    FeatureSelectionEngine, ReductionMethod, SelectionConfig, VarianceFilter,
};
use regression_explorer::utils::columns_to_array2;
use regression_explorer::ExplorerError;

/// `n` rows: `a` informative, `b` near-constant, `c` a near-copy of `a` leaning
/// toward `d`, `d` cyclic, one row with a null id
fn mixed_df(n: usize) -> DataFrame {
    let ids: Vec<Option<String>> = (0..n)
        .map(|i| if i == 3 { None } else { Some(format!("s{:02}", i)) })
        .collect();
    let a: Vec<f64> = (0..n).map(|i| i as f64 * 0.5).collect();
    let b: Vec<f64> = (0..n).map(|i| if i == 7 { 1.0 } else { 0.0 }).collect();
    let d: Vec<f64> = (0..n).map(|i| ((i * 7) % 5) as f64).collect();
    let c: Vec<f64> = (0..n).map(|i| 2.0 * a[i] + 0.3 * d[i]).collect();
    let y: Vec<f64> = (0..n).map(|i| a[i] + d[i]).collect();
    df!(
        "id" => ids,
        "a" => a,
        "b" => b,
        "c" => c,
        "d" => d,
        "y" => y
    )
    .unwrap()
}

fn names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_hidden_columns_pass_through_aligned() {
    let df = mixed_df(20);
    let engine = FeatureSelectionEngine::new(&[ReductionMethod::Correlation, ReductionMethod::Variance]);
    let result = engine.select(&df, "y", &["id".to_string()]);
    assert!(result.is_ok(), "selection should succeed: {:?}", result.err());
    let outcome = result.unwrap();

    assert_eq!(outcome.dropped_rows, 1);
    assert_eq!(names(&outcome.frame), vec!["id", "a", "d", "y"]);

    let ids: Vec<String> = outcome
        .frame
        .column("id")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap().to_string())
        .collect();
    let expected: Vec<String> = (0..20).filter(|&i| i != 3).map(|i| format!("s{:02}", i)).collect();
    assert_eq!(ids, expected);

    // Row alignment: y = a + d on every surviving row
    let x = columns_to_array2(&outcome.frame, &["a".to_string(), "d".to_string(), "y".to_string()]).unwrap();
    for row in x.rows() {
        assert!((row[0] + row[1] - row[2]).abs() < 1e-12);
    }
}

#[test]
fn test_step_log_records_removed_columns() {
    let result = FeatureSelectionEngine::new(&ReductionMethod::all())
        .with_config(
            SelectionConfig::default().with_boruta(
                BorutaConfig::default()
                    .with_max_iter(30)
                    .with_n_estimators(BorutaEstimators::Fixed(30)),
            ),
        )
        .select(&mixed_df(120), "y", &["id".to_string()]);
    assert!(result.is_ok(), "selection should succeed: {:?}", result.err());
    let outcome = result.unwrap();

    let methods: Vec<ReductionMethod> = outcome.steps.iter().map(|s| s.method).collect();
    assert_eq!(methods, ReductionMethod::all().to_vec());
    assert_eq!(outcome.steps[0].removed, vec!["b".to_string()]);
    assert_eq!(outcome.steps[1].removed, vec!["c".to_string()]);
    assert!(!outcome.steps[2].removed.contains(&"a".to_string()));

    assert_eq!(outcome.features[0], "a");
    let report = outcome.boruta.expect("boruta report");
    assert_eq!(report.decisions.len(), 2);
    assert!(report.confirmed().contains(&0));
}

#[test]
fn test_variance_filter_idempotent() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let x = Array2::from_shape_fn((60, 6), |(_, j)| rng.gen::<f64>() * j as f64 * 0.6);
    let filter = VarianceFilter::default();

    let kept = filter.select(&x);
    let reduced = x.select(ndarray::Axis(1), &kept);
    assert_eq!(filter.select(&reduced), (0..kept.len()).collect::<Vec<_>>());
}

#[test]
fn test_correlation_pruning_leaves_no_pair_above_threshold() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let base = Array2::from_shape_fn((80, 4), |_| rng.gen::<f64>());
    let mut x = Array2::zeros((80, 8));
    for i in 0..80 {
        for j in 0..4 {
            x[[i, j]] = base[[i, j]];
            // Near-copies of each base column
            x[[i, j + 4]] = base[[i, j]] * 3.0 + rng.gen::<f64>() * 0.01;
        }
    }

    let kept = CorrelationPruner::default().select(&x);
    assert!(kept.len() >= 4);
    assert!(kept.len() < 8);

    let corr = abs_correlation_matrix(&x.select(ndarray::Axis(1), &kept));
    for i in 0..kept.len() {
        for j in 0..kept.len() {
            if i != j {
                assert!(corr[[i, j]] < 0.95, "pair ({}, {}) = {}", kept[i], kept[j], corr[[i, j]]);
            }
        }
    }
}

#[test]
fn test_pruning_tie_break_is_deterministic() {
    let x = Array2::from_shape_fn((30, 4), |(i, j)| match j {
        0 => i as f64,
        1 => i as f64 + if i % 2 == 0 { 0.3 } else { -0.3 },
        2 => ((i * 7) % 5) as f64,
        _ => ((i * 3) % 11) as f64,
    });
    let pruner = CorrelationPruner::default();
    let first = pruner.select(&x);
    for _ in 0..5 {
        assert_eq!(pruner.select(&x), first);
    }
    assert_eq!(first.len(), 3);
    assert!(first.contains(&2) && first.contains(&3));
}

#[test]
fn test_empty_result_fails_fast() {
    let df = df!(
        "flat" => &[1.0, 1.0, 1.0, 1.0],
        "y" => &[1.0, 2.0, 3.0, 4.0]
    )
    .unwrap();
    let result = FeatureSelectionEngine::new(&[ReductionMethod::Variance]).select(&df, "y", &[]);
    assert!(matches!(result, Err(ExplorerError::NoFeaturesRemain { ref step }) if step == "variance"));
}

#[test]
fn test_unknown_method_label() {
    assert!(matches!(
        ReductionMethod::from_label("pca"),
        Err(ExplorerError::InvalidInput(_))
    ));
}
