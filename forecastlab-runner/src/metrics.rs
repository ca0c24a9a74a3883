//! Forecast error metrics — pure functions over backtest records.
//!
//! Errors are `y_hat - y_true`, so a positive bias means over-forecasting.

use serde::{Deserialize, Serialize};

use forecastlab_core::domain::BacktestRecord;

/// Aggregate error metrics for one (horizon, model) backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub count: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Percent; rows with a zero truth are excluded. `None` if none remain.
    pub mape: Option<f64>,
    pub bias: f64,
}

impl ErrorMetrics {
    pub fn compute(records: &[BacktestRecord]) -> Self {
        Self {
            count: records.len(),
            mae: mae(records),
            rmse: rmse(records),
            mape: mape(records),
            bias: bias(records),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Mean absolute error. 0.0 for no records.
pub fn mae(records: &[BacktestRecord]) -> f64 {
    mean(records.iter().map(|r| r.error().abs()))
}

/// Root mean squared error. 0.0 for no records.
pub fn rmse(records: &[BacktestRecord]) -> f64 {
    mean(records.iter().map(|r| r.error().powi(2))).sqrt()
}

/// Mean absolute percentage error over rows with a non-zero truth.
pub fn mape(records: &[BacktestRecord]) -> Option<f64> {
    let ratios: Vec<f64> = records
        .iter()
        .filter(|r| r.y_true != 0.0)
        .map(|r| (r.error() / r.y_true).abs())
        .collect();
    if ratios.is_empty() {
        return None;
    }
    Some(100.0 * mean(ratios.into_iter()))
}

/// Mean signed error.
pub fn bias(records: &[BacktestRecord]) -> f64 {
    mean(records.iter().map(BacktestRecord::error))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
