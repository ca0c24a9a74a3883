//! Frame — a date-indexed columnar table with typed column roles.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::table::TableError;

/// What a column is, which decides how later stages may treat it.
///
/// Gap filling only ever touches `Exogenous` columns; targets never reach
/// a feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnRole {
    /// The anchor series' own value (the quantity being forecast).
    Anchor,
    /// Auxiliary source values, merged onto the anchor calendar.
    Exogenous,
    /// Day-of-week, month, weekend flag.
    Calendar,
    /// `base(t - k)`.
    Lag,
    /// Causal rolling aggregate.
    Rolling,
    /// `anchor(t + horizon)`.
    Target { horizon: u32 },
}

impl ColumnRole {
    /// Whether the column may be used as a model input.
    pub fn is_feature(&self) -> bool {
        !matches!(self, ColumnRole::Target { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameColumn {
    pub name: String,
    pub role: ColumnRole,
    pub values: Vec<Option<f64>>,
}

impl FrameColumn {
    pub fn new(name: impl Into<String>, role: ColumnRole, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            role,
            values,
        }
    }
}

/// Date axis plus equally long columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    dates: Vec<NaiveDate>,
    columns: Vec<FrameColumn>,
}

impl Frame {
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            columns: Vec::new(),
        }
    }

    pub fn height(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[FrameColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&FrameColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut FrameColumn> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Append a column. Names are unique and every column spans the full axis.
    pub fn push_column(&mut self, column: FrameColumn) -> Result<(), TableError> {
        if self.has_column(&column.name) {
            return Err(TableError::DuplicateColumn {
                column: column.name,
            });
        }
        if column.values.len() != self.dates.len() {
            return Err(TableError::LengthMismatch {
                column: column.name,
                len: column.values.len(),
                rows: self.dates.len(),
            });
        }
        self.columns.push(column);
        Ok(())
    }

    /// Names of columns with the given role, in table order.
    pub fn names_with_role(&self, pred: impl Fn(&ColumnRole) -> bool) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| pred(&c.role))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// New frame with only the rows whose mask entry is true.
    pub fn filter_rows(&self, keep: &[bool]) -> Frame {
        debug_assert_eq!(keep.len(), self.dates.len());
        let pick = |i: usize| keep.get(i).copied().unwrap_or(false);

        let dates = self
            .dates
            .iter()
            .enumerate()
            .filter(|(i, _)| pick(*i))
            .map(|(_, d)| *d)
            .collect();
        let columns = self
            .columns
            .iter()
            .map(|c| FrameColumn {
                name: c.name.clone(),
                role: c.role,
                values: c
                    .values
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| pick(*i))
                    .map(|(_, v)| *v)
                    .collect(),
            })
            .collect();

        Frame { dates, columns }
    }

    /// Row index of `date`, if present.
    pub fn row_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }
}
