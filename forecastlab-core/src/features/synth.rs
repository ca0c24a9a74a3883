//! FeatureSynthesizer: aligned table -> feature table.

use tracing::debug;

use super::calendar::calendar_columns;
use super::window::{ColumnFeature, Lag, Rolling};
use super::{FeatureConfig, FeatureError};
use crate::domain::{AlignedTable, ColumnRole, FeatureTable, Frame, FrameColumn};

/// Appends calendar, lag and rolling columns. Row count is unchanged.
#[derive(Debug, Clone, Default)]
pub struct FeatureSynthesizer {
    config: FeatureConfig,
}

impl FeatureSynthesizer {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn synthesize(&self, aligned: AlignedTable) -> Result<FeatureTable, FeatureError> {
        self.config.validate()?;
        let (mut frame, anchor) = aligned.into_parts();

        for column in calendar_columns(frame.dates()) {
            frame.push_column(column)?;
        }

        let mut lag_bases = vec![anchor.clone()];
        lag_bases.extend(self.config.lag_columns.iter().filter(|c| **c != anchor).cloned());
        for base in &lag_bases {
            for &k in &self.config.lags {
                derive(&mut frame, base, &Lag::new(base, k), ColumnRole::Lag)?;
            }
        }

        for spec in &self.config.rolling {
            let base = spec.column.as_deref().unwrap_or(&anchor);
            derive(&mut frame, base, &Rolling::new(base, spec.window, spec.agg), ColumnRole::Rolling)?;
        }

        debug!(
            rows = frame.height(),
            columns = frame.columns().len(),
            "synthesized features"
        );
        Ok(FeatureTable::new(frame, anchor))
    }
}

/// Compute `feature` from `base` and append it.
///
/// Only source columns (anchor or exogenous) may be a base, so a derived
/// feature never feeds another one.
fn derive(
    frame: &mut Frame,
    base: &str,
    feature: &dyn ColumnFeature,
    role: ColumnRole,
) -> Result<(), FeatureError> {
    let values = match frame.column(base) {
        Some(col) if matches!(col.role, ColumnRole::Anchor | ColumnRole::Exogenous) => {
            feature.compute(&col.values)
        }
        _ => {
            return Err(FeatureError::UnknownColumn {
                column: base.to_string(),
            })
        }
    };
    frame.push_column(FrameColumn::new(feature.name(), role, values))?;
    Ok(())
}
