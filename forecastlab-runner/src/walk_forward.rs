//! Walk-forward validation — expanding train windows, contiguous test windows,
//! then one full-history refit.
//!
//! With `n` trainable rows, fold `k` trains on rows `[0, i)` and tests on
//! `[i, min(i + step, n))` where `i = min_train + k * step`, for every such
//! `i < n - 1`. Test windows are disjoint, contiguous and in order. They
//! reach row `n - 1` except when a fold would start on it, in which case
//! that last row goes unevaluated. Each fold fits a fresh model. The refit used for forecasting is a separate fit on all `n`
//! rows and never shares state with a fold model.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;
use tracing::{debug, info};

use forecastlab_core::domain::{BacktestRecord, ForecastRecord, HorizonDataset, TableError};

use crate::estimator::{Estimator, EstimatorError, Predictor};

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Rows in the first training window.
    pub min_train: usize,
    /// Test window length and per-fold growth of the training window.
    pub step: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            min_train: 365,
            step: 7,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Row ranges of one fold, over the trainable-row sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardSplit {
    pub fold_index: usize,
    /// Always starts at 0.
    pub train: Range<usize>,
    /// Starts where `train` ends.
    pub test: Range<usize>,
}

#[derive(Debug)]
pub struct WalkForwardResult {
    pub horizon: u32,
    pub splits: Vec<WalkForwardSplit>,
    /// Out-of-sample predictions, in row order.
    pub records: Vec<BacktestRecord>,
    /// Fit on every trainable row.
    pub final_model: Box<dyn Predictor>,
    /// The final model's predictions for the trailing rows.
    pub forecasts: Vec<ForecastRecord>,
    pub trainable_rows: usize,
}

#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("invalid walk-forward config: {reason}")]
    InvalidConfig { reason: String },

    #[error("no trainable rows for horizon {horizon}")]
    NoTrainableRows { horizon: u32 },

    #[error("fit failed on fold {fold}")]
    FoldFailed {
        fold: usize,
        #[source]
        source: EstimatorError,
    },

    #[error("final refit failed")]
    RefitFailed {
        #[source]
        source: EstimatorError,
    },

    #[error("model returned {got} predictions for {expected} rows")]
    PredictionLength { expected: usize, got: usize },

    #[error(transparent)]
    Table(#[from] TableError),
}

// ─── Split creation ──────────────────────────────────────────────────

/// Expanding-window splits over `n` rows.
///
/// A fold never starts on the final row, so a would-be single-row tail
/// window is dropped. Returns no splits when `n <= min_train + 1`; that is
/// not an error, the caller still refits on whatever rows exist.
pub fn create_splits(
    n: usize,
    config: &WalkForwardConfig,
) -> Result<Vec<WalkForwardSplit>, WalkForwardError> {
    if config.min_train == 0 {
        return Err(WalkForwardError::InvalidConfig {
            reason: "min_train must be positive".into(),
        });
    }
    if config.step == 0 {
        return Err(WalkForwardError::InvalidConfig {
            reason: "step must be positive".into(),
        });
    }

    let mut splits = Vec::new();
    let mut cursor = config.min_train;
    while cursor + 1 < n {
        let end = (cursor + config.step).min(n);
        splits.push(WalkForwardSplit {
            fold_index: splits.len(),
            train: 0..cursor,
            test: cursor..end,
        });
        cursor += config.step;
    }
    Ok(splits)
}

// ─── Orchestration ───────────────────────────────────────────────────

/// Backtest `estimator` over `dataset`, then refit it on every row and
/// forecast the last `forecast_rows` rows (every row when 0).
pub fn run_walk_forward(
    dataset: &HorizonDataset,
    estimator: &dyn Estimator,
    config: &WalkForwardConfig,
    forecast_rows: usize,
) -> Result<WalkForwardResult, WalkForwardError> {
    let n = dataset.len();
    let horizon = dataset.horizon();
    if n == 0 {
        return Err(WalkForwardError::NoTrainableRows { horizon });
    }

    let splits = create_splits(n, config)?;
    let mut records = Vec::with_capacity(n.saturating_sub(config.min_train));

    for split in &splits {
        let train = dataset.slice(split.train.clone())?;
        let test = dataset.slice(split.test.clone())?;

        let model = estimator
            .fit(train.features(), train.target())
            .map_err(|source| WalkForwardError::FoldFailed {
                fold: split.fold_index,
                source,
            })?;
        let predictions = model
            .predict(test.features())
            .map_err(|source| WalkForwardError::FoldFailed {
                fold: split.fold_index,
                source,
            })?;
        check_length(test.len(), predictions.len())?;

        for (row, y_hat) in predictions.into_iter().enumerate() {
            records.push(BacktestRecord {
                date_input: test.dates()[row],
                target_date: test.target_date(row),
                y_true: test.target()[row],
                y_hat,
            });
        }
        debug!(
            horizon,
            model = estimator.name(),
            fold = split.fold_index,
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            "fold evaluated"
        );
    }

    let final_model = estimator
        .fit(dataset.features(), dataset.target())
        .map_err(|source| WalkForwardError::RefitFailed { source })?;
    let forecasts = forecast(final_model.as_ref(), dataset, forecast_rows)?;

    info!(
        horizon,
        model = estimator.name(),
        rows = n,
        folds = splits.len(),
        evaluated = records.len(),
        forecasts = forecasts.len(),
        "walk-forward complete"
    );

    Ok(WalkForwardResult {
        horizon,
        splits,
        records,
        final_model,
        forecasts,
        trainable_rows: n,
    })
}

/// Predict the last `rows` rows of `dataset` (every row when 0).
pub fn forecast(
    model: &dyn Predictor,
    dataset: &HorizonDataset,
    rows: usize,
) -> Result<Vec<ForecastRecord>, WalkForwardError> {
    let tail = if rows == 0 {
        dataset.clone()
    } else {
        dataset.tail(rows)?
    };
    let predictions = model
        .predict(tail.features())
        .map_err(|source| WalkForwardError::RefitFailed { source })?;
    check_length(tail.len(), predictions.len())?;

    Ok(predictions
        .into_iter()
        .enumerate()
        .map(|(row, y_hat)| ForecastRecord {
            date_input: tail.dates()[row],
            target_date: tail.target_date(row),
            y_hat,
        })
        .collect())
}

fn check_length(expected: usize, got: usize) -> Result<(), WalkForwardError> {
    if expected != got {
        return Err(WalkForwardError::PredictionLength { expected, got });
    }
    Ok(())
}
