//! Calendar features, derived from the date alone.

use chrono::{Datelike, NaiveDate};

use crate::domain::{ColumnRole, FrameColumn};

pub const DAY_OF_WEEK: &str = "dow";
pub const MONTH: &str = "month";
pub const IS_WEEKEND: &str = "is_wknd";

/// `dow` (Monday = 0), `month` (1-12) and `is_wknd` (0/1).
pub fn calendar_columns(dates: &[NaiveDate]) -> Vec<FrameColumn> {
    let dow: Vec<u32> = dates
        .iter()
        .map(|d| d.weekday().num_days_from_monday())
        .collect();

    vec![
        FrameColumn::new(
            DAY_OF_WEEK,
            ColumnRole::Calendar,
            dow.iter().map(|&d| Some(f64::from(d))).collect(),
        ),
        FrameColumn::new(
            MONTH,
            ColumnRole::Calendar,
            dates.iter().map(|d| Some(f64::from(d.month()))).collect(),
        ),
        FrameColumn::new(
            IS_WEEKEND,
            ColumnRole::Calendar,
            dow.iter().map(|&d| Some(if d >= 5 { 1.0 } else { 0.0 })).collect(),
        ),
    ]
}
