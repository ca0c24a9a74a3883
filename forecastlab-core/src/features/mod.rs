//! Feature synthesis and target construction.
//!
//! Every derived column is a causal function of its base column: the value
//! at row `t` reads rows `<= t` only. Target columns are the single
//! exception and are added last, by [`construct_targets`].

pub mod calendar;
pub mod synth;
pub mod target;
pub mod window;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::TableError;

pub use synth::FeatureSynthesizer;
pub use target::construct_targets;
pub use window::{Aggregation, ColumnFeature, Lag, Rolling};

/// A rolling aggregate over one base column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingSpec {
    /// Base column; the anchor column when unset.
    #[serde(default)]
    pub column: Option<String>,
    pub window: usize,
    #[serde(default)]
    pub agg: Aggregation,
}

impl RollingSpec {
    pub fn mean(window: usize) -> Self {
        Self {
            column: None,
            window,
            agg: Aggregation::Mean,
        }
    }

    pub fn sum_of(column: impl Into<String>, window: usize) -> Self {
        Self {
            column: Some(column.into()),
            window,
            agg: Aggregation::Sum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Lag offsets in days.
    pub lags: Vec<u32>,
    /// Columns to lag besides the anchor.
    pub lag_columns: Vec<String>,
    pub rolling: Vec<RollingSpec>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lags: vec![1, 7, 14],
            lag_columns: Vec::new(),
            rolling: vec![RollingSpec::mean(7), RollingSpec::mean(30)],
        }
    }
}

impl FeatureConfig {
    /// Positivity checks only; column existence is checked at synthesis time.
    pub fn validate(&self) -> Result<(), FeatureError> {
        if let Some(&lag) = self.lags.iter().find(|&&k| k == 0) {
            return Err(FeatureError::InvalidLag { lag });
        }
        if let Some(spec) = self.rolling.iter().find(|s| s.window == 0) {
            return Err(FeatureError::InvalidWindow {
                window: spec.window,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("lag must be positive, got {lag}")]
    InvalidLag { lag: u32 },

    #[error("rolling window must be positive, got {window}")]
    InvalidWindow { window: usize },

    #[error("horizon must be positive, got {horizon}")]
    InvalidHorizon { horizon: u32 },

    #[error("at least one horizon is required")]
    NoHorizons,

    #[error("feature base column '{column}' not found")]
    UnknownColumn { column: String },

    #[error(transparent)]
    Table(#[from] TableError),
}
