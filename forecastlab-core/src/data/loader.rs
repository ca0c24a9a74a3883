//! CSV loading and writing via polars.
//!
//! Every input file has a `date` column plus numeric value columns. Values
//! are coerced to `f64` non-strictly: a cell that does not parse becomes
//! missing instead of failing the load.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info, warn};

use super::source::{AnchorSpec, DataError, SourceSpec};
use crate::domain::{
    parse_target_column, ColumnRole, DailySeries, Frame, FrameColumn, SeriesColumn,
    TrainableTable, DATE_COLUMN,
};

/// Anchor plus whatever auxiliary sources were present on disk.
#[derive(Debug, Clone)]
pub struct LoadedSources {
    pub anchor: DailySeries,
    pub auxiliary: Vec<DailySeries>,
    /// Optional sources whose file was absent.
    pub skipped: Vec<String>,
}

/// Raw file content in file order, before sorting and deduplication.
struct RawTable {
    dates: Vec<NaiveDate>,
    columns: Vec<(String, Vec<Option<f64>>)>,
}

// ─── Reading ─────────────────────────────────────────────────────────

/// Read one CSV into a [`DailySeries`] named `name`.
///
/// Rows are sorted by date; for duplicate dates the first row in file order
/// wins.
pub fn read_series_csv(path: &Path, name: &str) -> Result<DailySeries, DataError> {
    let raw = read_raw_csv(path, name)?;
    into_series(name, raw)
}

/// Load a source, honouring its kind when the file is absent.
///
/// Returns `Ok(None)` for a missing optional source.
pub fn load_source(spec: &SourceSpec) -> Result<Option<DailySeries>, DataError> {
    if !spec.path.exists() {
        if spec.kind.is_required() {
            return Err(DataError::MissingSource {
                name: spec.name.clone(),
                path: spec.path.display().to_string(),
            });
        }
        info!(source = %spec.name, path = %spec.path.display(), "optional source absent, skipping");
        return Ok(None);
    }

    let mut series = read_series_csv(&spec.path, &spec.name)?.renamed(&spec.rename)?;
    if let Some(columns) = &spec.columns {
        for column in columns {
            if series.column(column).is_none() {
                return Err(DataError::MissingColumn {
                    name: spec.name.clone(),
                    column: column.clone(),
                });
            }
        }
        series = series.select(columns);
    }

    info!(
        source = %spec.name,
        rows = series.len(),
        columns = series.columns().len(),
        "loaded source"
    );
    Ok(Some(series))
}

/// Load the anchor and make sure its forecast column exists.
///
/// A file with exactly one value column has that column renamed to the
/// configured anchor column.
pub fn load_anchor(spec: &AnchorSpec) -> Result<DailySeries, DataError> {
    let series = load_source(&spec.as_source())?.ok_or_else(|| DataError::MissingSource {
        name: spec.name.clone(),
        path: spec.path.display().to_string(),
    })?;

    if series.column(&spec.column).is_some() {
        return Ok(series);
    }

    match series.column_names().as_slice() {
        [only] => {
            debug!(source = %spec.name, from = %only, to = %spec.column, "inferred anchor column");
            let mut rename = std::collections::BTreeMap::new();
            rename.insert(only.to_string(), spec.column.clone());
            Ok(series.renamed(&rename)?)
        }
        _ => Err(DataError::MissingColumn {
            name: spec.name.clone(),
            column: spec.column.clone(),
        }),
    }
}

/// Load the anchor and every auxiliary source. Any missing required file
/// aborts; missing optional files are recorded in `skipped`.
pub fn load_sources(anchor: &AnchorSpec, sources: &[SourceSpec]) -> Result<LoadedSources, DataError> {
    let anchor = load_anchor(anchor)?;
    let mut auxiliary = Vec::with_capacity(sources.len());
    let mut skipped = Vec::new();

    for spec in sources {
        match load_source(spec)? {
            Some(series) => auxiliary.push(series),
            None => skipped.push(spec.name.clone()),
        }
    }

    Ok(LoadedSources {
        anchor,
        auxiliary,
        skipped,
    })
}

/// Read a persisted trainable table back, re-identifying column roles by name.
pub fn read_trainable_csv(
    path: &Path,
    anchor: &str,
    horizons: &[u32],
) -> Result<TrainableTable, DataError> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "features".to_string());
    if !path.exists() {
        return Err(DataError::MissingSource {
            name,
            path: path.display().to_string(),
        });
    }

    let series = read_series_csv(path, &name)?;
    let mut frame = Frame::new(series.dates().to_vec());
    for column in series.columns() {
        let role = infer_role(&column.name, anchor);
        frame.push_column(FrameColumn::new(column.name.clone(), role, column.values.clone()))?;
    }

    let table = TrainableTable::from_frame(frame, anchor, horizons)?;
    info!(path = %path.display(), rows = table.height(), "loaded feature table");
    Ok(table)
}

/// Column role implied by a persisted column name.
fn infer_role(name: &str, anchor: &str) -> ColumnRole {
    if let Some(horizon) = parse_target_column(name) {
        return ColumnRole::Target { horizon };
    }
    if name == anchor {
        return ColumnRole::Anchor;
    }
    if matches!(name, "dow" | "month" | "is_wknd") {
        return ColumnRole::Calendar;
    }
    if has_numeric_suffix(name, "_lag") {
        return ColumnRole::Lag;
    }
    if has_numeric_suffix(name, "_ma") || has_numeric_suffix(name, "_sum") {
        return ColumnRole::Rolling;
    }
    ColumnRole::Exogenous
}

fn has_numeric_suffix(name: &str, marker: &str) -> bool {
    name.rfind(marker)
        .map(|pos| &name[pos + marker.len()..])
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn read_raw_csv(path: &Path, name: &str) -> Result<RawTable, DataError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| read_error(path, e))?;

    let date_column = df
        .column(DATE_COLUMN)
        .map_err(|_| DataError::MissingDateColumn {
            name: name.to_string(),
        })?;
    let date_strings = date_column
        .as_materialized_series()
        .cast(&DataType::String)
        .map_err(|e| read_error(path, e))?;
    let date_chunks = date_strings.str().map_err(|e| read_error(path, e))?;

    let mut dates = Vec::with_capacity(df.height());
    for (row, raw) in date_chunks.into_iter().enumerate() {
        let raw = raw.unwrap_or("");
        let date = parse_date(raw).ok_or_else(|| DataError::InvalidDate {
            name: name.to_string(),
            // 1-based, counting the header line
            line: row + 2,
            value: raw.to_string(),
        })?;
        dates.push(date);
    }

    let mut columns = Vec::with_capacity(df.width().saturating_sub(1));
    for column in df.get_columns() {
        if column.name().as_str() == DATE_COLUMN {
            continue;
        }
        let values = coerce_numeric(column.as_materialized_series()).map_err(|e| read_error(path, e))?;
        columns.push((column.name().to_string(), values));
    }

    Ok(RawTable { dates, columns })
}

/// Non-strict cast to `f64`; unparseable and non-finite cells become `None`.
pub(crate) fn coerce_numeric(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Sort by date (stable), drop repeated dates, build the series.
fn into_series(name: &str, raw: RawTable) -> Result<DailySeries, DataError> {
    let mut order: Vec<usize> = (0..raw.dates.len()).collect();
    order.sort_by_key(|&i| raw.dates[i]);

    let mut keep: Vec<usize> = Vec::with_capacity(order.len());
    let mut duplicates = 0usize;
    for i in order {
        if keep.last().is_some_and(|&last| raw.dates[last] == raw.dates[i]) {
            duplicates += 1;
            continue;
        }
        keep.push(i);
    }
    if duplicates > 0 {
        warn!(source = name, duplicates, "duplicate dates dropped, first occurrence kept");
    }

    let dates = keep.iter().map(|&i| raw.dates[i]).collect();
    let columns = raw
        .columns
        .into_iter()
        .map(|(column, values)| SeriesColumn::new(column, keep.iter().map(|&i| values[i]).collect()))
        .collect();

    Ok(DailySeries::new(name, dates, columns)?)
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive datetimes; only the
/// calendar date is kept.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    s.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

pub(crate) fn read_error(path: &Path, e: impl std::fmt::Display) -> DataError {
    DataError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

// ─── Writing ─────────────────────────────────────────────────────────

/// Write a series as `date,<columns...>`. Missing cells are left empty.
pub fn write_series_csv(series: &DailySeries, path: &Path) -> Result<(), DataError> {
    let mut frame = Frame::new(series.dates().to_vec());
    for column in series.columns() {
        frame.push_column(FrameColumn::new(
            column.name.clone(),
            ColumnRole::Exogenous,
            column.values.clone(),
        ))?;
    }
    write_frame_csv(&frame, path)
}

/// Persist a trainable table in column order: `date`, anchor, features, targets.
pub fn write_trainable_csv(table: &TrainableTable, path: &Path) -> Result<(), DataError> {
    write_frame_csv(table.frame(), path)?;
    info!(path = %path.display(), rows = table.height(), "wrote feature table");
    Ok(())
}

fn write_frame_csv(frame: &Frame, path: &Path) -> Result<(), DataError> {
    let write_error = |e: &dyn std::fmt::Display| DataError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let mut columns: Vec<Column> = Vec::with_capacity(frame.columns().len() + 1);
    let dates: Vec<String> = frame.dates().iter().map(|d| d.to_string()).collect();
    columns.push(Column::new(DATE_COLUMN.into(), dates));
    for column in frame.columns() {
        columns.push(Column::new(column.name.as_str().into(), column.values.clone()));
    }
    let mut df = DataFrame::new(columns).map_err(|e| write_error(&e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| write_error(&e))?;
    }
    let mut file = File::create(path).map_err(|e| write_error(&e))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .map_err(|e| write_error(&e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_common_shapes() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(parse_date("2024-03-05"), Some(d));
        assert_eq!(parse_date(" 2024-03-05 "), Some(d));
        assert_eq!(parse_date("2024-03-05T13:45:00Z"), Some(d));
        assert_eq!(parse_date("2024-03-05 00:00:00"), Some(d));
        assert_eq!(parse_date("2024-03-05T00:00:00-05:00"), Some(d));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn roles_inferred_from_names() {
        assert_eq!(infer_role("target_t+7", "hh"), ColumnRole::Target { horizon: 7 });
        assert_eq!(infer_role("hh", "hh"), ColumnRole::Anchor);
        assert_eq!(infer_role("dow", "hh"), ColumnRole::Calendar);
        assert_eq!(infer_role("hh_lag14", "hh"), ColumnRole::Lag);
        assert_eq!(infer_role("hh_ma30", "hh"), ColumnRole::Rolling);
        assert_eq!(infer_role("hdd_sum7", "hh"), ColumnRole::Rolling);
        assert_eq!(infer_role("hh_lagged", "hh"), ColumnRole::Exogenous);
        assert_eq!(infer_role("storage_bcf", "hh"), ColumnRole::Exogenous);
    }

    #[test]
    fn into_series_sorts_and_keeps_first_duplicate() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let raw = RawTable {
            dates: vec![d(3), d(1), d(3), d(2)],
            columns: vec![("v".into(), vec![Some(30.0), Some(10.0), Some(99.0), None])],
        };
        let series = into_series("x", raw).unwrap();
        assert_eq!(series.dates(), &[d(1), d(2), d(3)]);
        assert_eq!(series.column("v").unwrap().values, vec![Some(10.0), None, Some(30.0)]);
    }
}
