//! Gradient boosting on squared error.
//!
//! Starts from the training mean and adds `n_stages` depth-limited trees,
//! each fit to the current residuals and shrunk by `learning_rate`.

use forecastlab_core::domain::FeatureMatrix;

use super::tree::{RegressionTree, TreeParams};
use super::{check_columns, check_training, Estimator, EstimatorError, ModelArtifact, Predictor};

#[derive(Debug, Clone, Copy)]
pub struct GradientBoosting {
    n_stages: usize,
    learning_rate: f64,
    params: TreeParams,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self {
            n_stages: 100,
            learning_rate: 0.1,
            params: TreeParams::with_max_depth(3),
        }
    }
}

impl GradientBoosting {
    pub fn new(n_stages: usize, learning_rate: f64, max_depth: usize) -> Self {
        Self {
            n_stages,
            learning_rate,
            params: TreeParams::with_max_depth(max_depth),
        }
    }
}

impl Estimator for GradientBoosting {
    fn name(&self) -> &str {
        "gbm"
    }

    fn fit(&self, x: &FeatureMatrix, y: &[f64]) -> Result<Box<dyn Predictor>, EstimatorError> {
        check_training(x, y)?;
        let n = x.n_rows();
        let rows: Vec<usize> = (0..n).collect();
        let init = y.iter().sum::<f64>() / n as f64;

        let mut fitted = vec![init; n];
        let mut residual = vec![0.0; n];
        let mut trees = Vec::with_capacity(self.n_stages);
        for _ in 0..self.n_stages {
            for ((r, t), f) in residual.iter_mut().zip(y).zip(&fitted) {
                *r = t - f;
            }
            let tree = RegressionTree::fit(x, &residual, &rows, &self.params);
            for (i, f) in fitted.iter_mut().enumerate() {
                *f += self.learning_rate * tree.predict_row(x.row(i));
            }
            trees.push(tree);
        }

        Ok(Box::new(GbmModel::new(x.n_cols(), init, self.learning_rate, trees)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GbmModel {
    n_features: usize,
    init: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GbmModel {
    pub fn new(n_features: usize, init: f64, learning_rate: f64, trees: Vec<RegressionTree>) -> Self {
        Self {
            n_features,
            init,
            learning_rate,
            trees,
        }
    }
}

impl Predictor for GbmModel {
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, EstimatorError> {
        check_columns(self.n_features, x)?;
        Ok((0..x.n_rows())
            .map(|r| {
                let row = x.row(r);
                self.trees
                    .iter()
                    .fold(self.init, |acc, t| acc + self.learning_rate * t.predict_row(row))
            })
            .collect())
    }

    fn artifact(&self) -> Option<ModelArtifact> {
        Some(ModelArtifact::Gbm {
            n_features: self.n_features,
            init: self.init,
            learning_rate: self.learning_rate,
            trees: self.trees.clone(),
        })
    }
}
