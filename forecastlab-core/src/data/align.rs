//! Calendar alignment.
//!
//! Builds one contiguous daily axis from the anchor's first to last date and
//! left-joins every auxiliary series onto it. Auxiliary gaps are filled
//! (forward, then backward, then zero); the anchor column is left exactly
//! as observed.

use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{AlignedTable, ColumnRole, DailySeries, Frame, FrameColumn, TableError};

#[derive(Debug, Error, PartialEq)]
pub enum AlignError {
    #[error("anchor series '{series}' has no rows")]
    EmptyAnchor { series: String },

    #[error("anchor series '{series}' has no column '{column}'")]
    MissingAnchorColumn { series: String, column: String },

    #[error("column '{column}' from source '{source_name}' already exists; rename it before merging")]
    ColumnCollision { column: String, source_name: String },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Align `auxiliary` onto the calendar of `anchor`.
///
/// The anchor's other value columns (if any) are carried as exogenous
/// columns and filled like auxiliary data.
pub fn align(
    anchor: &DailySeries,
    anchor_column: &str,
    auxiliary: &[DailySeries],
) -> Result<AlignedTable, AlignError> {
    let (first, last) = match (anchor.first_date(), anchor.last_date()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(AlignError::EmptyAnchor {
                series: anchor.name().to_string(),
            })
        }
    };
    if anchor.column(anchor_column).is_none() {
        return Err(AlignError::MissingAnchorColumn {
            series: anchor.name().to_string(),
            column: anchor_column.to_string(),
        });
    }

    let axis = calendar_axis(first, last);
    let index: HashMap<NaiveDate, usize> = axis.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    let mut frame = Frame::new(axis);

    for column in anchor.columns() {
        let role = if column.name == anchor_column {
            ColumnRole::Anchor
        } else {
            ColumnRole::Exogenous
        };
        let values = left_join(anchor.dates(), &column.values, &index);
        frame.push_column(FrameColumn::new(column.name.clone(), role, values))?;
    }

    for series in auxiliary {
        for column in series.columns() {
            if frame.has_column(&column.name) {
                return Err(AlignError::ColumnCollision {
                    column: column.name.clone(),
                    source_name: series.name().to_string(),
                });
            }
            let values = left_join(series.dates(), &column.values, &index);
            frame.push_column(FrameColumn::new(column.name.clone(), ColumnRole::Exogenous, values))?;
        }
        let out_of_range = series.dates().iter().filter(|d| !index.contains_key(d)).count();
        debug!(source = series.name(), out_of_range, "merged auxiliary source");
    }

    fill_exogenous(&mut frame);

    info!(
        anchor = anchor.name(),
        rows = frame.height(),
        start = %first,
        end = %last,
        sources = auxiliary.len(),
        "aligned calendar"
    );
    Ok(AlignedTable::new(frame, anchor_column.to_string()))
}

/// Every calendar day in `[first, last]`.
fn calendar_axis(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    first
        .iter_days()
        .take_while(|d| *d <= last)
        .collect()
}

/// Place `values` at their dates on the axis; dates off the axis are dropped.
fn left_join(
    dates: &[NaiveDate],
    values: &[Option<f64>],
    index: &HashMap<NaiveDate, usize>,
) -> Vec<Option<f64>> {
    let mut out = vec![None; index.len()];
    for (date, value) in dates.iter().zip(values) {
        if let Some(&row) = index.get(date) {
            out[row] = *value;
        }
    }
    out
}

fn fill_exogenous(frame: &mut Frame) {
    let names: Vec<String> = frame
        .names_with_role(|r| matches!(r, ColumnRole::Exogenous))
        .into_iter()
        .map(str::to_string)
        .collect();
    for name in names {
        if let Some(column) = frame.column_mut(&name) {
            fill_gaps(&mut column.values);
        }
    }
}

/// Forward-fill, then backward-fill the leading prefix, then zero.
pub(crate) fn fill_gaps(values: &mut [Option<f64>]) {
    let mut last = None;
    for v in values.iter_mut() {
        if v.is_some() {
            last = *v;
        } else {
            *v = last;
        }
    }

    let first_seen = values.iter().flatten().next().copied();
    for v in values.iter_mut() {
        if v.is_some() {
            break;
        }
        *v = first_seen;
    }

    for v in values.iter_mut() {
        if v.is_none() {
            *v = Some(0.0);
        }
    }
}

/// Day count helper for callers checking calendar completeness.
pub fn span_days(first: NaiveDate, last: NaiveDate) -> usize {
    let days = (last - first).num_days();
    usize::try_from(days).map(|d| d + 1).unwrap_or(0)
}
