//! Bagged regression forest.
//!
//! Each tree is grown on a bootstrap sample of the training rows with every
//! feature considered at every split. Tree `i` draws its sample from its own
//! seed, so the fitted forest does not depend on how rayon schedules work.

use rand::Rng;
use rayon::prelude::*;

use forecastlab_core::domain::FeatureMatrix;
use forecastlab_core::rng::SeedHierarchy;

use super::tree::{RegressionTree, TreeParams};
use super::{check_columns, check_training, Estimator, EstimatorError, ModelArtifact, Predictor};

pub const DEFAULT_TREES: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct RandomForest {
    n_trees: usize,
    params: TreeParams,
    seed: u64,
}

impl RandomForest {
    pub fn new(seed: u64) -> Self {
        Self {
            n_trees: DEFAULT_TREES,
            params: TreeParams::default(),
            seed,
        }
    }

    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees.max(1);
        self
    }

    pub fn with_params(mut self, params: TreeParams) -> Self {
        self.params = params;
        self
    }
}

impl Estimator for RandomForest {
    fn name(&self) -> &str {
        "rf"
    }

    fn fit(&self, x: &FeatureMatrix, y: &[f64]) -> Result<Box<dyn Predictor>, EstimatorError> {
        check_training(x, y)?;
        let n = x.n_rows();
        let seeds = SeedHierarchy::new(self.seed);

        let trees: Vec<RegressionTree> = (0..self.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = seeds.rng_for("rf-bootstrap", 0, i as u64);
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, &sample, &self.params)
            })
            .collect();

        Ok(Box::new(ForestModel::new(x.n_cols(), trees)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForestModel {
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl ForestModel {
    pub fn new(n_features: usize, trees: Vec<RegressionTree>) -> Self {
        Self { n_features, trees }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Predictor for ForestModel {
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, EstimatorError> {
        check_columns(self.n_features, x)?;
        if self.trees.is_empty() {
            return Ok(vec![0.0; x.n_rows()]);
        }
        let n_trees = self.trees.len() as f64;
        Ok((0..x.n_rows())
            .into_par_iter()
            .map(|r| {
                let row = x.row(r);
                // sequential sum keeps the result independent of thread count
                self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees
            })
            .collect())
    }

    fn artifact(&self) -> Option<ModelArtifact> {
        Some(ModelArtifact::Forest {
            n_features: self.n_features,
            trees: self.trees.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::test_support::{linear_data, step_data};

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = linear_data(50);
        let a = RandomForest::new(42).with_trees(25).fit(&x, &y).unwrap();
        let b = RandomForest::new(42).with_trees(25).fit(&x, &y).unwrap();
        assert_eq!(a.artifact(), b.artifact());
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn different_seed_different_bootstrap() {
        let (x, y) = linear_data(50);
        let a = RandomForest::new(1).with_trees(10).fit(&x, &y).unwrap();
        let b = RandomForest::new(2).with_trees(10).fit(&x, &y).unwrap();
        assert_ne!(a.artifact(), b.artifact());
    }

    #[test]
    fn predictions_stay_within_target_range() {
        let (x, y) = step_data(40);
        let model = RandomForest::new(7).with_trees(30).fit(&x, &y).unwrap();
        for p in model.predict(&x).unwrap() {
            assert!((1.0..=4.0).contains(&p), "{p}");
        }
    }

    #[test]
    fn artifact_round_trips_through_json() {
        let (x, y) = linear_data(30);
        let model = RandomForest::new(3).with_trees(5).fit(&x, &y).unwrap();
        let json = serde_json::to_string(&model.artifact().unwrap()).unwrap();
        let back: ModelArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back.into_predictor().predict(&x).unwrap(), model.predict(&x).unwrap());
    }

    #[test]
    fn default_forest_size() {
        let (x, y) = step_data(12);
        let model = RandomForest::new(0).fit(&x, &y).unwrap();
        match model.artifact().unwrap() {
            ModelArtifact::Forest { trees, .. } => assert_eq!(trees.len(), DEFAULT_TREES),
            other => panic!("unexpected artifact {other:?}"),
        }
    }
}
