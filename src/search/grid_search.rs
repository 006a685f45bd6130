//! Exhaustive hyperparameter search scored by k-fold cross-validation

use super::pipeline::Pipeline;
use crate::error::{ExplorerError, Result};
use crate::strategy::{ParamGrid, PipelineParams, RegressionStrategy};
use crate::training::{r2_score, CVResults, CVSplit, KFold};
use crate::utils::{take_elems, take_rows};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Cross-validated score of one grid point
#[derive(Debug, Clone)]
pub struct CandidateScore {
    pub params: PipelineParams,
    /// Per-fold R²; `mean_score` is NaN when the candidate failed
    pub cv: CVResults,
}

impl CandidateScore {
    pub fn mean_score(&self) -> f64 {
        self.cv.mean_score
    }
}

#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best_params: PipelineParams,
    pub best_score: f64,
    /// Every candidate in grid order
    pub candidates: Vec<CandidateScore>,
}

/// Grid search over a strategy's parameter grid
#[derive(Debug, Clone)]
pub struct GridSearch {
    strategy: RegressionStrategy,
    grid: ParamGrid,
    cv: KFold,
}

impl GridSearch {
    /// Search the strategy's own grid under shuffled k-fold CV
    pub fn new(strategy: RegressionStrategy, cv_folds: usize, cv_seed: u64) -> Self {
        Self {
            strategy,
            grid: strategy.param_grid(),
            cv: KFold::shuffled(cv_folds, cv_seed),
        }
    }

    /// Replace the searched grid
    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    /// Score every candidate and pick the first with the highest mean R²
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult> {
        if x.ncols() == 0 {
            return Err(ExplorerError::NoFeaturesRemain {
                step: "grid search".to_string(),
            });
        }
        let splits = self.cv.split(x.nrows())?;
        let candidates = self.grid.candidates();
        debug!(
            strategy = self.strategy.name(),
            candidates = candidates.len(),
            folds = splits.len(),
            "Starting grid search"
        );

        let outcomes: Vec<(CandidateScore, Option<ExplorerError>)> = candidates
            .into_par_iter()
            .map(|params| match self.score_candidate(&params, x, y, &splits) {
                Ok(scores) => {
                    let cv = CVResults::from_scores(scores);
                    debug!(strategy = self.strategy.name(), params = %params, score = cv.mean_score, "Scored candidate");
                    (CandidateScore { params, cv }, None)
                }
                Err(e) => {
                    warn!(strategy = self.strategy.name(), params = %params, error = %e, "Candidate failed");
                    let cv = CVResults {
                        scores: Vec::new(),
                        mean_score: f64::NAN,
                        std_score: f64::NAN,
                    };
                    (CandidateScore { params, cv }, Some(e))
                }
            })
            .collect();

        let mut best: Option<usize> = None;
        for (i, (candidate, _)) in outcomes.iter().enumerate() {
            let score = candidate.mean_score();
            if score.is_nan() {
                continue;
            }
            if best.map_or(true, |b| score > outcomes[b].0.mean_score()) {
                best = Some(i);
            }
        }

        let best = match best {
            Some(b) => b,
            None => {
                let reason = outcomes
                    .into_iter()
                    .find_map(|(_, e)| e)
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no candidate produced a finite score".to_string());
                return Err(ExplorerError::FitFailure {
                    step: "grid search".to_string(),
                    strategy: Some(self.strategy.name().to_string()),
                    reason: format!("every candidate failed; first error: {}", reason),
                });
            }
        };

        let candidates: Vec<CandidateScore> = outcomes.into_iter().map(|(c, _)| c).collect();
        let best_params = candidates[best].params.clone();
        let best_score = candidates[best].mean_score();
        info!(
            strategy = self.strategy.name(),
            params = %best_params,
            score = best_score,
            "Grid search finished"
        );

        Ok(GridSearchResult {
            best_params,
            best_score,
            candidates,
        })
    }

    fn score_candidate(
        &self,
        params: &PipelineParams,
        x: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[CVSplit],
    ) -> Result<Vec<f64>> {
        splits
            .iter()
            .map(|split| {
                let mut pipeline = Pipeline::new(self.strategy, params)?;
                pipeline.fit(&take_rows(x, &split.train_indices), &take_elems(y, &split.train_indices))?;
                let pred = pipeline.predict(&take_rows(x, &split.test_indices))?;
                let score = r2_score(&take_elems(y, &split.test_indices), &pred)?;
                if score.is_finite() {
                    Ok(score)
                } else {
                    Err(ExplorerError::ComputationError(format!(
                        "non-finite score on fold {}",
                        split.fold_idx
                    )))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{ParamValue, PipelineStep};

    fn linear_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| ((i * (j + 2) + j) % 11) as f64 + i as f64 * 0.05);
        let y = x.column(0).mapv(|v| 2.0 * v) + x.column(2) - 1.0;
        (x, y)
    }

    #[test]
    fn test_ols_single_candidate() {
        let (x, y) = linear_data(40);
        let result = GridSearch::new(RegressionStrategy::OrdinaryLeastSquares, 5, 0)
            .fit(&x, &y)
            .unwrap();
        assert_eq!(result.candidates.len(), 1);
        assert!(result.best_params.is_empty());
        assert!(result.best_score > 0.999);
    }

    #[test]
    fn test_prefers_small_ridge_penalty_on_clean_data() {
        let (x, y) = linear_data(40);
        let grid = ParamGrid::new().with_model_param(
            "alpha",
            vec![ParamValue::Float(1000.0), ParamValue::Float(0.001)],
        );
        let result = GridSearch::new(RegressionStrategy::Ridge, 5, 0)
            .with_grid(grid)
            .fit(&x, &y)
            .unwrap();
        let best = result.best_params.for_step(PipelineStep::Model);
        assert_eq!(best["alpha"], ParamValue::Float(0.001));
    }

    #[test]
    fn test_failed_candidates_are_skipped() {
        let (x, y) = linear_data(40);
        // 100 components cannot fit 32 training rows
        let grid = ParamGrid::new().with_model_param(
            "n_components",
            vec![ParamValue::Int(100), ParamValue::Int(1)],
        );
        let result = GridSearch::new(RegressionStrategy::GaussianMixture, 5, 0)
            .with_grid(grid)
            .fit(&x, &y)
            .unwrap();
        assert!(result.candidates[0].mean_score().is_nan());
        let best = result.best_params.for_step(PipelineStep::Model);
        assert_eq!(best["n_components"], ParamValue::Int(1));
    }

    #[test]
    fn test_all_candidates_failing_is_fit_failure() {
        let (x, y) = linear_data(40);
        let grid = ParamGrid::new().with_model_param("n_components", vec![ParamValue::Int(100)]);
        let err = GridSearch::new(RegressionStrategy::GaussianMixture, 5, 0)
            .with_grid(grid)
            .fit(&x, &y)
            .unwrap_err();
        assert!(matches!(err, ExplorerError::FitFailure { ref step, .. } if step == "grid search"));
    }
}
