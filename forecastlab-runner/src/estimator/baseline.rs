//! Training-mean baseline.

use forecastlab_core::domain::FeatureMatrix;

use super::{check_training, Estimator, EstimatorError, ModelArtifact, Predictor};

/// Predicts the mean training target for every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanBaseline;

impl Estimator for MeanBaseline {
    fn name(&self) -> &str {
        "mean"
    }

    fn fit(&self, x: &FeatureMatrix, y: &[f64]) -> Result<Box<dyn Predictor>, EstimatorError> {
        check_training(x, y)?;
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        Ok(Box::new(ConstantModel::new(mean)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantModel {
    value: f64,
}

impl ConstantModel {
    pub fn new(value: f64) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Predictor for ConstantModel {
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, EstimatorError> {
        Ok(vec![self.value; x.n_rows()])
    }

    fn artifact(&self) -> Option<ModelArtifact> {
        Some(ModelArtifact::Constant { value: self.value })
    }
}
