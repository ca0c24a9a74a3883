//! Backtest and forecast output rows.
//!
//! Field order is the persisted column order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One evaluated out-of-sample prediction from a walk-forward fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRecord {
    pub date_input: NaiveDate,
    /// `date_input + horizon` days.
    pub target_date: NaiveDate,
    pub y_true: f64,
    pub y_hat: f64,
}

impl BacktestRecord {
    pub fn error(&self) -> f64 {
        self.y_hat - self.y_true
    }
}

/// One prediction from the full-history refit model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub date_input: NaiveDate,
    pub target_date: NaiveDate,
    pub y_hat: f64,
}
