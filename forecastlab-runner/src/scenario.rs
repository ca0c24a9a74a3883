//! What-if scenarios: add fixed deltas to feature columns of the most recent
//! rows and re-predict with a saved final model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

use forecastlab_core::domain::{TableError, TrainableTable};

use crate::estimator::EstimatorError;
use crate::export::ModelFile;

/// Trailing rows re-predicted when no count is given.
pub const DEFAULT_SCENARIO_ROWS: usize = 60;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("invalid shocks: {0}")]
    InvalidShocks(String),

    #[error("failed to read shocks from '{path}'")]
    ReadShocks {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model expects features {expected:?}, table has {got:?}")]
    FeatureMismatch { expected: Vec<String>, got: Vec<String> },

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),
}

/// Additive shocks, `column -> delta`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShockSet(pub BTreeMap<String, f64>);

impl ShockSet {
    /// Parse a JSON object literal, or `@path` to read one from a file.
    pub fn parse(arg: &str) -> Result<Self, ScenarioError> {
        let arg = arg.trim();
        let json = match arg.strip_prefix('@') {
            Some(path) => {
                let path = PathBuf::from(path);
                std::fs::read_to_string(&path)
                    .map_err(|source| ScenarioError::ReadShocks { path, source })?
            }
            None => arg.to_string(),
        };
        let shocks: ShockSet =
            serde_json::from_str(&json).map_err(|e| ScenarioError::InvalidShocks(e.to_string()))?;
        if let Some((column, _)) = shocks.0.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ScenarioError::InvalidShocks(format!(
                "delta for '{column}' is not finite"
            )));
        }
        Ok(shocks)
    }
}

/// One shocked prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub date_input: NaiveDate,
    pub target_date: NaiveDate,
    pub y_hat_scn: f64,
}

#[derive(Debug)]
pub struct ScenarioOutcome {
    pub records: Vec<ScenarioRecord>,
    pub applied: Vec<String>,
    /// Shock columns the table does not have.
    pub skipped: Vec<String>,
}

/// Shock the last `rows` rows (every row when 0) of `table` and predict them
/// with the model in `model_file`.
pub fn run_scenario(
    model_file: &ModelFile,
    table: &TrainableTable,
    shocks: &ShockSet,
    rows: usize,
) -> Result<ScenarioOutcome, ScenarioError> {
    let dataset = table.dataset(model_file.horizon)?;
    let recent = if rows == 0 {
        dataset
    } else {
        dataset.tail(rows)?
    };

    let mut features = recent.features().clone();
    if features.column_names() != model_file.feature_columns.as_slice() {
        return Err(ScenarioError::FeatureMismatch {
            expected: model_file.feature_columns.clone(),
            got: features.column_names().to_vec(),
        });
    }

    let mut applied = Vec::new();
    let mut skipped = Vec::new();
    for (column, delta) in &shocks.0 {
        match features.column_index(column) {
            Some(c) => {
                features.shift_column(c, *delta);
                applied.push(column.clone());
            }
            None => {
                warn!(column = %column, "shock column not found, skipping");
                skipped.push(column.clone());
            }
        }
    }

    let predictor = model_file.artifact.clone().into_predictor();
    let predictions = predictor.predict(&features)?;
    let records = predictions
        .into_iter()
        .enumerate()
        .map(|(row, y_hat_scn)| ScenarioRecord {
            date_input: recent.dates()[row],
            target_date: recent.target_date(row),
            y_hat_scn,
        })
        .collect();

    Ok(ScenarioOutcome {
        records,
        applied,
        skipped,
    })
}
