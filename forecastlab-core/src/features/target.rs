//! Forward-shifted targets and the trainable-row filter.

use tracing::info;

use super::FeatureError;
use crate::domain::{target_column, ColumnRole, FeatureTable, FrameColumn, TableError, TrainableTable};

/// Append `target_t+H = anchor(t + H)` for each horizon, then keep only rows
/// whose anchor value and every target are present.
///
/// The feature table's axis is contiguous, so `t + H` rows is `t + H` days.
/// Rows dropped here are expected attrition, not an error.
pub fn construct_targets(table: FeatureTable, horizons: &[u32]) -> Result<TrainableTable, FeatureError> {
    if horizons.is_empty() {
        return Err(FeatureError::NoHorizons);
    }
    if let Some(&horizon) = horizons.iter().find(|&&h| h == 0) {
        return Err(FeatureError::InvalidHorizon { horizon });
    }
    let mut unique: Vec<u32> = Vec::with_capacity(horizons.len());
    for &h in horizons {
        if !unique.contains(&h) {
            unique.push(h);
        }
    }

    let (mut frame, anchor) = table.into_parts();
    let base = frame
        .column(&anchor)
        .map(|c| c.values.clone())
        .ok_or_else(|| TableError::MissingAnchor {
            column: anchor.clone(),
        })?;
    let n = base.len();

    let mut keep: Vec<bool> = base.iter().map(Option::is_some).collect();
    for &h in &unique {
        let shift = h as usize;
        let target: Vec<Option<f64>> = (0..n)
            .map(|t| base.get(t + shift).copied().flatten())
            .collect();
        for (k, v) in keep.iter_mut().zip(&target) {
            *k &= v.is_some();
        }
        frame.push_column(FrameColumn::new(
            target_column(h),
            ColumnRole::Target { horizon: h },
            target,
        ))?;
    }

    let kept = keep.iter().filter(|k| **k).count();
    info!(
        rows = n,
        kept,
        dropped = n - kept,
        horizons = ?unique,
        "constructed targets"
    );

    let frame = frame.filter_rows(&keep);
    Ok(TrainableTable::from_frame(frame, anchor, &unique)?)
}
