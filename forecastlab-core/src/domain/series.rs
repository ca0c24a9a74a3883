//! DailySeries — one source's date-indexed value columns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// A named value column of a [`DailySeries`]. `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl SeriesColumn {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Ordered daily observations from a single source.
///
/// Dates are strictly increasing with no duplicates. They need not be
/// contiguous: weekends, holidays and outages simply have no row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    name: String,
    dates: Vec<NaiveDate>,
    columns: Vec<SeriesColumn>,
}

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("series '{series}': dates not strictly increasing at row {row} ({prev} then {next})")]
    NotIncreasing {
        series: String,
        row: usize,
        prev: NaiveDate,
        next: NaiveDate,
    },

    #[error("series '{series}': column '{column}' has {len} values for {rows} dates")]
    LengthMismatch {
        series: String,
        column: String,
        len: usize,
        rows: usize,
    },

    #[error("series '{series}': duplicate column '{column}'")]
    DuplicateColumn { series: String, column: String },
}

impl DailySeries {
    /// Build a series, enforcing the ordering and shape invariants.
    pub fn new(
        name: impl Into<String>,
        dates: Vec<NaiveDate>,
        columns: Vec<SeriesColumn>,
    ) -> Result<Self, SeriesError> {
        let name = name.into();

        for (row, pair) in dates.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(SeriesError::NotIncreasing {
                    series: name,
                    row: row + 1,
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }

        let mut seen = HashSet::new();
        for col in &columns {
            if col.values.len() != dates.len() {
                return Err(SeriesError::LengthMismatch {
                    series: name,
                    column: col.name.clone(),
                    len: col.values.len(),
                    rows: dates.len(),
                });
            }
            if !seen.insert(col.name.as_str()) {
                return Err(SeriesError::DuplicateColumn {
                    series: name,
                    column: col.name.clone(),
                });
            }
        }

        Ok(Self {
            name,
            dates,
            columns,
        })
    }

    /// Convenience constructor for a single fully-observed column.
    pub fn from_points(
        name: impl Into<String>,
        column: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self, SeriesError> {
        let (dates, values): (Vec<NaiveDate>, Vec<Option<f64>>) =
            points.into_iter().map(|(d, v)| (d, Some(v))).unzip();
        Self::new(name, dates, vec![SeriesColumn::new(column, values)])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[SeriesColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&SeriesColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Value of `column` on `date`, if the row exists and the cell is present.
    pub fn value_at(&self, column: &str, date: NaiveDate) -> Option<f64> {
        let row = self.dates.binary_search(&date).ok()?;
        self.column(column)?.values[row]
    }

    /// Apply a caller-supplied `old -> new` column renaming.
    ///
    /// Renaming two columns onto the same name is rejected rather than
    /// silently dropping one of them.
    pub fn renamed(mut self, renames: &BTreeMap<String, String>) -> Result<Self, SeriesError> {
        if renames.is_empty() {
            return Ok(self);
        }
        for col in &mut self.columns {
            if let Some(new_name) = renames.get(&col.name) {
                col.name = new_name.clone();
            }
        }
        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(SeriesError::DuplicateColumn {
                    series: self.name.clone(),
                    column: col.name.clone(),
                });
            }
        }
        Ok(self)
    }

    /// Keep only the named columns (in the given order). Unknown names are ignored.
    pub fn select(mut self, names: &[String]) -> Self {
        let mut kept = Vec::with_capacity(names.len());
        for name in names {
            if let Some(pos) = self.columns.iter().position(|c| &c.name == name) {
                kept.push(self.columns.swap_remove(pos));
            }
        }
        self.columns = kept;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn rejects_duplicate_dates() {
        let err = DailySeries::new(
            "hh",
            vec![d(1), d(2), d(2)],
            vec![SeriesColumn::new("v", vec![Some(1.0), Some(2.0), Some(3.0)])],
        )
        .unwrap_err();
        assert!(matches!(err, SeriesError::NotIncreasing { row: 2, .. }));
    }

    #[test]
    fn rejects_unsorted_dates() {
        let err = DailySeries::from_points("hh", "v", [(d(3), 1.0), (d(1), 2.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::NotIncreasing { .. }));
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = DailySeries::new(
            "hh",
            vec![d(1), d(2)],
            vec![SeriesColumn::new("v", vec![Some(1.0)])],
        )
        .unwrap_err();
        assert!(matches!(err, SeriesError::LengthMismatch { len: 1, rows: 2, .. }));
    }

    #[test]
    fn gapped_dates_are_fine() {
        let s = DailySeries::from_points("hh", "v", [(d(1), 1.0), (d(5), 2.0)]).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.value_at("v", d(5)), Some(2.0));
        assert_eq!(s.value_at("v", d(3)), None);
    }

    #[test]
    fn rename_detects_collisions() {
        let s = DailySeries::new(
            "cpc",
            vec![d(1)],
            vec![
                SeriesColumn::new("index", vec![Some(1.0)]),
                SeriesColumn::new("other", vec![Some(2.0)]),
            ],
        )
        .unwrap();

        let mut ok = BTreeMap::new();
        ok.insert("index".to_string(), "cpc_610_idx".to_string());
        let renamed = s.clone().renamed(&ok).unwrap();
        assert_eq!(renamed.column_names(), vec!["cpc_610_idx", "other"]);

        let mut clash = BTreeMap::new();
        clash.insert("index".to_string(), "other".to_string());
        assert!(matches!(
            s.renamed(&clash),
            Err(SeriesError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn select_keeps_requested_order() {
        let s = DailySeries::new(
            "ais",
            vec![d(1)],
            vec![
                SeriesColumn::new("a", vec![Some(1.0)]),
                SeriesColumn::new("b", vec![Some(2.0)]),
                SeriesColumn::new("c", vec![Some(3.0)]),
            ],
        )
        .unwrap();
        let picked = s.select(&["c".to_string(), "a".to_string(), "zzz".to_string()]);
        assert_eq!(picked.column_names(), vec!["c", "a"]);
    }
}
