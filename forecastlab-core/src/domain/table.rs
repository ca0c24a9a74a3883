//! Stage tables: aligned -> feature -> trainable -> per-horizon dataset.
//!
//! Each pipeline stage consumes the previous table by value and returns the
//! next type, so a stage can only ever mutate a table it built itself.

use chrono::{Days, NaiveDate};
use std::ops::Range;
use thiserror::Error;

use super::frame::{ColumnRole, Frame};
use super::matrix::{FeatureMatrix, MatrixError};

const TARGET_PREFIX: &str = "target_t+";

/// Column name of the forward-shifted target for horizon `h`.
pub fn target_column(horizon: u32) -> String {
    format!("{TARGET_PREFIX}{horizon}")
}

/// Inverse of [`target_column`].
pub fn parse_target_column(name: &str) -> Option<u32> {
    name.strip_prefix(TARGET_PREFIX)?.parse().ok()
}

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("duplicate column '{column}'")]
    DuplicateColumn { column: String },

    #[error("column '{column}' has {len} values for {rows} rows")]
    LengthMismatch {
        column: String,
        len: usize,
        rows: usize,
    },

    #[error("anchor column '{column}' not found")]
    MissingAnchor { column: String },

    #[error("target column '{column}' for horizon {horizon} not found")]
    MissingTarget { horizon: u32, column: String },

    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

/// Output of the calendar aligner: one row per calendar day of the anchor's
/// span, anchor values untouched, exogenous gaps filled.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTable {
    frame: Frame,
    anchor: String,
}

impl AlignedTable {
    pub(crate) fn new(frame: Frame, anchor: String) -> Self {
        Self { frame, anchor }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn into_parts(self) -> (Frame, String) {
        (self.frame, self.anchor)
    }
}

/// Aligned table plus calendar, lag and rolling columns. Same row count.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    frame: Frame,
    anchor: String,
}

impl FeatureTable {
    pub(crate) fn new(frame: Frame, anchor: String) -> Self {
        Self { frame, anchor }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn into_parts(self) -> (Frame, String) {
        (self.frame, self.anchor)
    }
}

/// Rows whose anchor value and every requested target are present.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainableTable {
    frame: Frame,
    anchor: String,
    horizons: Vec<u32>,
}

impl TrainableTable {
    /// Wrap a frame that already carries target columns (e.g. one read back
    /// from a persisted feature file).
    pub fn from_frame(frame: Frame, anchor: impl Into<String>, horizons: &[u32]) -> Result<Self, TableError> {
        let anchor = anchor.into();
        if !frame.has_column(&anchor) {
            return Err(TableError::MissingAnchor { column: anchor });
        }
        for &h in horizons {
            let column = target_column(h);
            if !frame.has_column(&column) {
                return Err(TableError::MissingTarget { horizon: h, column });
            }
        }
        Ok(Self {
            frame,
            anchor,
            horizons: horizons.to_vec(),
        })
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    pub fn horizons(&self) -> &[u32] {
        &self.horizons
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// Names of the model-input columns, in table order.
    pub fn feature_names(&self) -> Vec<&str> {
        self.frame.names_with_role(ColumnRole::is_feature)
    }

    /// Features and target for one horizon.
    ///
    /// Rows lacking this horizon's target are excluded (only possible for
    /// tables read back from disk; the target constructor never emits them).
    pub fn dataset(&self, horizon: u32) -> Result<HorizonDataset, TableError> {
        let column = target_column(horizon);
        let target = self
            .frame
            .column(&column)
            .ok_or(TableError::MissingTarget { horizon, column })?;

        let keep: Vec<bool> = target.values.iter().map(|v| v.is_some()).collect();
        let frame = if keep.iter().all(|k| *k) {
            self.frame.clone()
        } else {
            self.frame.filter_rows(&keep)
        };

        let target: Vec<f64> = frame
            .column(&target_column(horizon))
            .map(|c| c.values.iter().flatten().copied().collect())
            .unwrap_or_default();

        let feature_columns = frame
            .columns()
            .iter()
            .filter(|c| c.role.is_feature())
            .map(|c| (c.name.clone(), c.values.as_slice()))
            .collect();
        let features = FeatureMatrix::from_columns(feature_columns, frame.height())?;

        Ok(HorizonDataset {
            horizon,
            dates: frame.dates().to_vec(),
            features,
            target,
        })
    }
}

/// Aligned dates, feature matrix and target vector for one horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonDataset {
    horizon: u32,
    dates: Vec<NaiveDate>,
    features: FeatureMatrix,
    target: Vec<f64>,
}

impl HorizonDataset {
    pub fn new(
        horizon: u32,
        dates: Vec<NaiveDate>,
        features: FeatureMatrix,
        target: Vec<f64>,
    ) -> Result<Self, TableError> {
        for (column, len) in [("features", features.n_rows()), ("target", target.len())] {
            if len != dates.len() {
                return Err(TableError::LengthMismatch {
                    column: column.to_string(),
                    len,
                    rows: dates.len(),
                });
            }
        }
        Ok(Self {
            horizon,
            dates,
            features,
            target,
        })
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// `dates[row] + horizon` days.
    pub fn target_date(&self, row: usize) -> NaiveDate {
        let date = self.dates[row];
        date.checked_add_days(Days::new(u64::from(self.horizon)))
            .unwrap_or(date)
    }

    /// Rows `[range.start, range.end)` as a new dataset.
    pub fn slice(&self, range: Range<usize>) -> Result<HorizonDataset, TableError> {
        let features = self.features.slice_rows(range.clone())?;
        Ok(HorizonDataset {
            horizon: self.horizon,
            dates: self.dates[range.clone()].to_vec(),
            features,
            target: self.target[range].to_vec(),
        })
    }

    /// The last `n` rows (all rows when `n` exceeds the length).
    pub fn tail(&self, n: usize) -> Result<HorizonDataset, TableError> {
        let start = self.len().saturating_sub(n);
        self.slice(start..self.len())
    }
}
