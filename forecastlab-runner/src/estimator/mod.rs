//! Estimator capability: fit on a feature matrix, predict one value per row.
//!
//! The walk-forward engine only sees [`Estimator`] and [`Predictor`]. Model
//! selection is a closed [`ModelKind`] enum mapped to concrete estimators,
//! each wrapped in a [`MedianImputer`] so tree and linear models never see a
//! missing cell.

pub mod baseline;
pub mod forest;
pub mod gbm;
pub mod impute;
pub mod ridge;
pub mod tree;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use forecastlab_core::domain::FeatureMatrix;

pub use baseline::{ConstantModel, MeanBaseline};
pub use forest::RandomForest;
pub use gbm::GradientBoosting;
pub use impute::MedianImputer;
pub use ridge::Ridge;
pub use tree::{RegressionTree, TreeParams};

#[derive(Debug, Error, PartialEq)]
pub enum EstimatorError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("feature matrix has {rows} rows but {targets} targets")]
    RowMismatch { rows: usize, targets: usize },

    #[error("model was fit on {expected} features, got {got}")]
    ColumnMismatch { expected: usize, got: usize },

    #[error("non-finite target at row {row}")]
    NonFiniteTarget { row: usize },

    #[error("normal equations are singular")]
    Singular,

    #[error("unknown model '{0}' (expected one of: mean, ridge, rf, gbm)")]
    UnknownModel(String),
}

/// Something that can be fit. Each call to `fit` returns a fresh, independent model.
pub trait Estimator: Send + Sync {
    fn name(&self) -> &str;

    fn fit(&self, x: &FeatureMatrix, y: &[f64]) -> Result<Box<dyn Predictor>, EstimatorError>;
}

/// A fitted model.
pub trait Predictor: Send + Sync + fmt::Debug {
    /// One prediction per row of `x`, in row order.
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, EstimatorError>;

    /// Serializable form of the fitted parameters, if the model has one.
    fn artifact(&self) -> Option<ModelArtifact> {
        None
    }
}

/// Shared input checks for `fit`.
pub(crate) fn check_training(x: &FeatureMatrix, y: &[f64]) -> Result<(), EstimatorError> {
    if x.n_rows() != y.len() {
        return Err(EstimatorError::RowMismatch {
            rows: x.n_rows(),
            targets: y.len(),
        });
    }
    if y.is_empty() {
        return Err(EstimatorError::EmptyTrainingSet);
    }
    if let Some(row) = y.iter().position(|v| !v.is_finite()) {
        return Err(EstimatorError::NonFiniteTarget { row });
    }
    Ok(())
}

pub(crate) fn check_columns(expected: usize, x: &FeatureMatrix) -> Result<(), EstimatorError> {
    if x.n_cols() != expected {
        return Err(EstimatorError::ColumnMismatch {
            expected,
            got: x.n_cols(),
        });
    }
    Ok(())
}

// ─── Persisted models ────────────────────────────────────────────────

/// Fitted parameters of any built-in model, as written to `models/*.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Constant {
        value: f64,
    },
    Ridge {
        columns: Vec<String>,
        intercept: f64,
        coefficients: Vec<f64>,
    },
    Forest {
        n_features: usize,
        trees: Vec<RegressionTree>,
    },
    Gbm {
        n_features: usize,
        init: f64,
        learning_rate: f64,
        trees: Vec<RegressionTree>,
    },
    Imputed {
        medians: Vec<f64>,
        inner: Box<ModelArtifact>,
    },
}

impl ModelArtifact {
    /// Rebuild a predictor from saved parameters.
    pub fn into_predictor(self) -> Box<dyn Predictor> {
        match self {
            ModelArtifact::Constant { value } => Box::new(ConstantModel::new(value)),
            ModelArtifact::Ridge {
                columns,
                intercept,
                coefficients,
            } => Box::new(ridge::RidgeModel::new(columns, intercept, coefficients)),
            ModelArtifact::Forest { n_features, trees } => {
                Box::new(forest::ForestModel::new(n_features, trees))
            }
            ModelArtifact::Gbm {
                n_features,
                init,
                learning_rate,
                trees,
            } => Box::new(gbm::GbmModel::new(n_features, init, learning_rate, trees)),
            ModelArtifact::Imputed { medians, inner } => {
                Box::new(impute::ImputedModel::new(medians, inner.into_predictor()))
            }
        }
    }
}

// ─── Model selection ─────────────────────────────────────────────────

/// The built-in models, selectable by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Training-mean constant.
    Mean,
    /// L2-regularised least squares, alpha = 1.
    Ridge,
    /// Bagged regression forest, 500 trees.
    Rf,
    /// Gradient-boosted trees, 100 stages of depth 3.
    #[serde(alias = "hgb")]
    Gbm,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [ModelKind::Mean, ModelKind::Ridge, ModelKind::Rf, ModelKind::Gbm];

    pub fn id(&self) -> &'static str {
        match self {
            ModelKind::Mean => "mean",
            ModelKind::Ridge => "ridge",
            ModelKind::Rf => "rf",
            ModelKind::Gbm => "gbm",
        }
    }

    /// A fresh imputer-wrapped estimator. `seed` only affects randomised models.
    pub fn build(&self, seed: u64) -> Box<dyn Estimator> {
        match self {
            ModelKind::Mean => Box::new(MedianImputer::new(MeanBaseline)),
            ModelKind::Ridge => Box::new(MedianImputer::new(Ridge::default())),
            ModelKind::Rf => Box::new(MedianImputer::new(RandomForest::new(seed))),
            ModelKind::Gbm => Box::new(MedianImputer::new(GradientBoosting::default())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelKind {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(ModelKind::Mean),
            "ridge" => Ok(ModelKind::Ridge),
            "rf" => Ok(ModelKind::Rf),
            "gbm" | "hgb" => Ok(ModelKind::Gbm),
            _ => Err(EstimatorError::UnknownModel(s.to_string())),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use forecastlab_core::domain::FeatureMatrix;

    /// `y = 3 x0 - 2 x1 + 5` on a small deterministic grid.
    pub fn linear_data(n: usize) -> (FeatureMatrix, Vec<f64>) {
        let mut data = Vec::with_capacity(n * 2);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let x0 = (i % 17) as f64 * 0.5;
            let x1 = ((i * 7) % 11) as f64;
            data.extend_from_slice(&[x0, x1]);
            y.push(3.0 * x0 - 2.0 * x1 + 5.0);
        }
        (FeatureMatrix::new(vec!["x0".into(), "x1".into()], n, data).unwrap(), y)
    }

    /// A step function of one feature, which trees fit exactly.
    pub fn step_data(n: usize) -> (FeatureMatrix, Vec<f64>) {
        let data: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y = (0..n).map(|i| if i < n / 2 { 1.0 } else { 4.0 }).collect();
        (FeatureMatrix::new(vec!["x".into()], n, data).unwrap(), y)
    }
}
