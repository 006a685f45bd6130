//! Optional standardization followed by a regressor

use crate::error::{ExplorerError, Result};
use crate::preprocessing::StandardScaler;
use crate::strategy::{PipelineParams, PipelineStep, RegressionStrategy};
use crate::training::Regressor;
use ndarray::{Array1, Array2};

/// A strategy's regressor, preceded by a `StandardScaler` when the strategy
/// requires scaled inputs
#[derive(Debug)]
pub struct Pipeline {
    strategy: RegressionStrategy,
    scaler: Option<StandardScaler>,
    model: Box<dyn Regressor>,
}

impl Pipeline {
    /// Build an unfitted pipeline from namespaced parameters
    pub fn new(strategy: RegressionStrategy, params: &PipelineParams) -> Result<Self> {
        let scaler_params = params.for_step(PipelineStep::Scaler);
        if let Some((name, value)) = scaler_params.iter().next() {
            return Err(ExplorerError::InvalidParameter {
                name: name.clone(),
                value: value.to_string(),
                reason: "the scaler takes no parameters".to_string(),
            });
        }

        let model = strategy.construct(&params.for_step(PipelineStep::Model))?;
        let scaler = strategy.requires_scaling().then(StandardScaler::new);
        Ok(Self {
            strategy,
            scaler,
            model,
        })
    }

    pub fn strategy(&self) -> RegressionStrategy {
        self.strategy
    }

    pub fn has_scaler(&self) -> bool {
        self.scaler.is_some()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self.scaler.as_mut() {
            Some(scaler) => {
                let scaled = scaler.fit_transform(x)?;
                self.model.fit(&scaled, y)
            }
            None => self.model.fit(x, y),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self.scaler.as_ref() {
            Some(scaler) => self.model.predict(&scaler.transform(x)?),
            None => self.model.predict(x),
        }
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.model.feature_importances()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{ParamGrid, ParamKey, ParamValue};

    #[test]
    fn test_scaling_policy_follows_strategy() {
        for &strategy in RegressionStrategy::all() {
            let pipeline = Pipeline::new(strategy, &PipelineParams::default()).unwrap();
            assert_eq!(pipeline.has_scaler(), strategy.requires_scaling(), "{}", strategy);
        }
    }

    #[test]
    fn test_scaler_parameters_rejected() {
        let mut grid = ParamGrid::new();
        grid.insert(ParamKey::new(PipelineStep::Scaler, "with_mean"), vec![ParamValue::Bool(false)]);
        let params = &grid.candidates()[0];
        assert!(Pipeline::new(RegressionStrategy::Ridge, params).is_err());
    }

    #[test]
    fn test_scaled_ridge_fit_predict() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| (i as f64) * (j as f64 + 1.0) * 100.0 + j as f64);
        let y = x.column(0).mapv(|v| v / 100.0 + 1.0);
        let mut params = crate::strategy::HyperParams::new();
        params.insert("alpha".to_string(), ParamValue::Float(1e-6));
        let mut pipeline = Pipeline::new(RegressionStrategy::Ridge, &PipelineParams::from_model(&params)).unwrap();
        pipeline.fit(&x, &y).unwrap();
        let pred = pipeline.predict(&x).unwrap();
        assert!((pred[10] - y[10]).abs() < 1e-3);
    }
}
