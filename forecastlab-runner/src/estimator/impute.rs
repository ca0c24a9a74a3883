//! Median imputation adapter.
//!
//! Medians are learned from the training rows only and reused unchanged at
//! prediction time, so no test-set statistic reaches the model.

use forecastlab_core::domain::FeatureMatrix;

use super::{check_columns, check_training, Estimator, EstimatorError, ModelArtifact, Predictor};

/// Wraps any estimator with per-column median fill.
#[derive(Debug, Clone)]
pub struct MedianImputer<E> {
    inner: E,
}

impl<E: Estimator> MedianImputer<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

/// Median of the finite values of each column; 0.0 for a column with none.
pub fn column_medians(x: &FeatureMatrix) -> Vec<f64> {
    (0..x.n_cols())
        .map(|c| {
            let mut values: Vec<f64> = x.column_values(c).filter(|v| v.is_finite()).collect();
            median(&mut values).unwrap_or(0.0)
        })
        .collect()
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

impl<E: Estimator> Estimator for MedianImputer<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fit(&self, x: &FeatureMatrix, y: &[f64]) -> Result<Box<dyn Predictor>, EstimatorError> {
        check_training(x, y)?;
        let medians = column_medians(x);
        let inner = self.inner.fit(&x.fill_missing(&medians), y)?;
        Ok(Box::new(ImputedModel::new(medians, inner)))
    }
}

#[derive(Debug)]
pub struct ImputedModel {
    medians: Vec<f64>,
    inner: Box<dyn Predictor>,
}

impl ImputedModel {
    pub fn new(medians: Vec<f64>, inner: Box<dyn Predictor>) -> Self {
        Self { medians, inner }
    }
}

impl Predictor for ImputedModel {
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, EstimatorError> {
        check_columns(self.medians.len(), x)?;
        self.inner.predict(&x.fill_missing(&self.medians))
    }

    fn artifact(&self) -> Option<ModelArtifact> {
        Some(ModelArtifact::Imputed {
            medians: self.medians.clone(),
            inner: Box::new(self.inner.artifact()?),
        })
    }
}
