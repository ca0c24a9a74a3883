//! FeatureMatrix — the numeric view handed to estimators.
//!
//! Row-major `f64` storage. Missing cells are `NaN`; whether an estimator
//! tolerates them is its own business (see the runner's imputation adapter).

use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MatrixError {
    #[error("matrix data has {len} cells, expected {rows} x {cols}")]
    ShapeMismatch { len: usize, rows: usize, cols: usize },

    #[error("row range {start}..{end} out of bounds for {rows} rows")]
    RowsOutOfBounds { start: usize, end: usize, rows: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    n_rows: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, n_rows: usize, data: Vec<f64>) -> Result<Self, MatrixError> {
        if data.len() != n_rows * columns.len() {
            return Err(MatrixError::ShapeMismatch {
                len: data.len(),
                rows: n_rows,
                cols: columns.len(),
            });
        }
        Ok(Self {
            columns,
            n_rows,
            data,
        })
    }

    /// Build from column-major optional values (the layout frames use).
    pub fn from_columns(columns: Vec<(String, &[Option<f64>])>, n_rows: usize) -> Result<Self, MatrixError> {
        let n_cols = columns.len();
        let mut data = vec![f64::NAN; n_rows * n_cols];
        for (c, (_, values)) in columns.iter().enumerate() {
            if values.len() != n_rows {
                return Err(MatrixError::ShapeMismatch {
                    len: values.len(),
                    rows: n_rows,
                    cols: 1,
                });
            }
            for (r, v) in values.iter().enumerate() {
                data[r * n_cols + c] = match v {
                    Some(x) if x.is_finite() => *x,
                    _ => f64::NAN,
                };
            }
        }
        let names = columns.into_iter().map(|(n, _)| n).collect();
        Self::new(names, n_rows, data)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row(&self, r: usize) -> &[f64] {
        let n = self.n_cols();
        &self.data[r * n..(r + 1) * n]
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.n_cols() + c]
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, c: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.n_rows).map(move |r| self.get(r, c))
    }

    /// Contiguous row slice `[range.start, range.end)` as a new matrix.
    pub fn slice_rows(&self, range: Range<usize>) -> Result<FeatureMatrix, MatrixError> {
        if range.start > range.end || range.end > self.n_rows {
            return Err(MatrixError::RowsOutOfBounds {
                start: range.start,
                end: range.end,
                rows: self.n_rows,
            });
        }
        let n = self.n_cols();
        Ok(FeatureMatrix {
            columns: self.columns.clone(),
            n_rows: range.len(),
            data: self.data[range.start * n..range.end * n].to_vec(),
        })
    }

    /// Replace every non-finite cell of column `c` with `fill[c]`.
    pub fn fill_missing(&self, fill: &[f64]) -> FeatureMatrix {
        let n = self.n_cols();
        let data = self
            .data
            .iter()
            .enumerate()
            .map(|(i, v)| if v.is_finite() { *v } else { fill[i % n] })
            .collect();
        FeatureMatrix {
            columns: self.columns.clone(),
            n_rows: self.n_rows,
            data,
        }
    }

    /// Add `delta` to every cell of column `c`.
    pub fn shift_column(&mut self, c: usize, delta: f64) {
        let n = self.n_cols();
        for r in 0..self.n_rows {
            self.data[r * n + c] += delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureMatrix {
        let a = [Some(1.0), Some(2.0), None];
        let b = [Some(10.0), Some(f64::INFINITY), Some(30.0)];
        FeatureMatrix::from_columns(vec![("a".into(), &a[..]), ("b".into(), &b[..])], 3).unwrap()
    }

    #[test]
    fn from_columns_maps_missing_and_infinite_to_nan() {
        let m = sample();
        assert_eq!(m.row(0), &[1.0, 10.0]);
        assert!(m.get(1, 1).is_nan());
        assert!(m.get(2, 0).is_nan());
    }

    #[test]
    fn slice_rows_bounds() {
        let m = sample();
        let s = m.slice_rows(1..3).unwrap();
        assert_eq!(s.n_rows(), 2);
        assert_eq!(s.get(1, 1), 30.0);
        assert!(m.slice_rows(2..4).is_err());
    }

    #[test]
    fn fill_missing_per_column() {
        let filled = sample().fill_missing(&[-1.0, -2.0]);
        assert_eq!(filled.get(2, 0), -1.0);
        assert_eq!(filled.get(1, 1), -2.0);
        assert_eq!(filled.get(0, 1), 10.0);
    }

    #[test]
    fn new_validates_shape() {
        assert!(FeatureMatrix::new(vec!["a".into()], 2, vec![1.0]).is_err());
    }
}
