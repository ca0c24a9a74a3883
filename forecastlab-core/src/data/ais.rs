//! Daily aggregation of AIS vessel-event logs.
//!
//! Each input CSV holds one row per event with a timestamp, an optional
//! event type and an optional vessel identifier. Events are floored to the
//! calendar day and counted per day:
//!
//! - `departures`: events whose type contains `DEP`, or every event when no
//!   input carries an event column
//! - `arrivals`: events whose type contains `ARR` (only with an event column)
//! - `unique_vessels`: distinct identifiers that day (only with a vessel column)

use chrono::NaiveDate;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::loader::{coerce_numeric, parse_date, read_error};
use super::source::DataError;
use crate::domain::{DailySeries, SeriesColumn, DATE_COLUMN};

pub const DEPARTURES: &str = "departures";
pub const ARRIVALS: &str = "arrivals";
pub const UNIQUE_VESSELS: &str = "unique_vessels";

const TIME_FALLBACKS: [&str; 5] = ["time", "datetime", "ts", "Timestamp", "DateTime"];
const VESSEL_FIELDS: [&str; 5] = ["vessel_id", "mmsi", "MMSI", "imo", "IMO"];

/// Column names in the raw event files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AisOptions {
    /// Preferred timestamp column; common alternatives are tried after it.
    pub time_column: String,
    pub event_column: String,
}

impl Default for AisOptions {
    fn default() -> Self {
        Self {
            time_column: "timestamp".into(),
            event_column: "event_type".into(),
        }
    }
}

/// Events from every input, one entry per row with a parseable timestamp.
#[derive(Default)]
struct Events {
    dates: Vec<String>,
    kinds: Vec<Option<String>>,
    vessels: Vec<Option<String>>,
    has_kind: bool,
    has_vessel: bool,
}

/// Aggregate event files into a daily series named `ais`.
pub fn aggregate_ais(paths: &[PathBuf], options: &AisOptions) -> Result<DailySeries, DataError> {
    let mut events = Events::default();
    for path in paths {
        read_events(path, options, &mut events)?;
    }
    if events.dates.is_empty() {
        return Err(DataError::EmptyResponse { series: "ais".into() });
    }

    let daily = daily_counts(&events).map_err(|e| DataError::Read {
        path: "ais".into(),
        reason: e.to_string(),
    })?;
    let series = into_series(&daily)?;
    info!(
        files = paths.len(),
        events = events.dates.len(),
        days = series.len(),
        "aggregated AIS events"
    );
    Ok(series)
}

fn read_events(path: &Path, options: &AisOptions, events: &mut Events) -> Result<(), DataError> {
    // Every column as text: identifiers must not be coerced to numbers.
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| read_error(path, e))?;

    let has = |name: &str| df.get_column_index(name).is_some();
    let time_column = std::iter::once(options.time_column.as_str())
        .chain(TIME_FALLBACKS)
        .find(|name| has(*name))
        .ok_or_else(|| DataError::MissingColumn {
            name: path.display().to_string(),
            column: options.time_column.clone(),
        })?;
    let vessel_column = VESSEL_FIELDS.into_iter().find(|name| has(*name));
    let kind_column = Some(options.event_column.as_str()).filter(|name| has(*name));
    events.has_kind |= kind_column.is_some();
    events.has_vessel |= vessel_column.is_some();

    let text = |name: &str| -> Result<Vec<Option<String>>, DataError> {
        let column = df.column(name).map_err(|e| read_error(path, e))?;
        let strings = column
            .as_materialized_series()
            .cast(&DataType::String)
            .map_err(|e| read_error(path, e))?;
        let chunks = strings.str().map_err(|e| read_error(path, e))?;
        Ok(chunks
            .into_iter()
            .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
            .collect())
    };
    let optional = |name: Option<&str>| -> Result<Vec<Option<String>>, DataError> {
        match name {
            Some(name) => text(name),
            None => Ok(vec![None; df.height()]),
        }
    };

    let times = text(time_column)?;
    let kinds = optional(kind_column)?;
    let vessels = optional(vessel_column)?;

    let mut dropped = 0usize;
    for ((time, kind), vessel) in times.into_iter().zip(kinds).zip(vessels) {
        let Some(date) = time.as_deref().and_then(parse_date) else {
            dropped += 1;
            continue;
        };
        events.dates.push(date.to_string());
        events.kinds.push(kind.map(|k| k.to_uppercase()));
        events.vessels.push(vessel);
    }
    if dropped > 0 {
        warn!(path = %path.display(), dropped, "AIS rows with unparseable timestamps dropped");
    }
    Ok(())
}

/// Group events by day. Dates are ISO strings, so a lexical sort is a
/// chronological one.
fn daily_counts(events: &Events) -> PolarsResult<DataFrame> {
    let flag = |marker: &str| -> Vec<u32> {
        events
            .kinds
            .iter()
            .map(|kind| match (events.has_kind, kind) {
                (false, _) => u32::from(marker == "DEP"),
                (true, Some(kind)) => u32::from(kind.contains(marker)),
                (true, None) => 0,
            })
            .collect()
    };

    let mut columns = vec![
        Column::new(DATE_COLUMN.into(), events.dates.clone()),
        Column::new(DEPARTURES.into(), flag("DEP")),
    ];
    let mut aggs = vec![col(DEPARTURES).sum().cast(DataType::Float64)];
    if events.has_kind {
        columns.push(Column::new(ARRIVALS.into(), flag("ARR")));
        aggs.push(col(ARRIVALS).sum().cast(DataType::Float64));
    }
    if events.has_vessel {
        columns.push(Column::new(UNIQUE_VESSELS.into(), events.vessels.clone()));
        aggs.push(
            col(UNIQUE_VESSELS)
                .drop_nulls()
                .n_unique()
                .cast(DataType::Float64),
        );
    }

    DataFrame::new(columns)?
        .lazy()
        .group_by([col(DATE_COLUMN)])
        .agg(aggs)
        .sort([DATE_COLUMN], SortMultipleOptions::default())
        .collect()
}

fn into_series(daily: &DataFrame) -> Result<DailySeries, DataError> {
    let polars_error = |e: PolarsError| DataError::Read {
        path: "ais".into(),
        reason: e.to_string(),
    };

    let date_column = daily.column(DATE_COLUMN).map_err(polars_error)?;
    let dates: Vec<NaiveDate> = date_column
        .as_materialized_series()
        .str()
        .map_err(polars_error)?
        .into_iter()
        .filter_map(|d| d.and_then(parse_date))
        .collect();

    let mut columns = Vec::new();
    for name in [DEPARTURES, ARRIVALS, UNIQUE_VESSELS] {
        if let Ok(column) = daily.column(name) {
            let values = coerce_numeric(column.as_materialized_series()).map_err(polars_error)?;
            columns.push(SeriesColumn::new(name, values));
        }
    }
    Ok(DailySeries::new("ais", dates, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(rows: &[(&str, Option<&str>, Option<&str>)], has_kind: bool, has_vessel: bool) -> Events {
        Events {
            dates: rows.iter().map(|r| r.0.to_string()).collect(),
            kinds: rows.iter().map(|r| r.1.map(str::to_string)).collect(),
            vessels: rows.iter().map(|r| r.2.map(str::to_string)).collect(),
            has_kind,
            has_vessel,
        }
    }

    fn values(series: &DailySeries, column: &str) -> Vec<Option<f64>> {
        series.column(column).unwrap().values.clone()
    }

    #[test]
    fn counts_by_event_type_and_vessel() {
        let ev = events(
            &[
                ("2024-03-02", Some("DEPARTURE"), Some("a")),
                ("2024-03-01", Some("ARRIVAL"), Some("a")),
                ("2024-03-01", Some("DEP"), Some("b")),
                ("2024-03-01", Some("DEP"), Some("b")),
                ("2024-03-02", Some("MOORED"), None),
            ],
            true,
            true,
        );
        let series = into_series(&daily_counts(&ev).unwrap()).unwrap();
        assert_eq!(
            series.dates(),
            &[
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
            ]
        );
        assert_eq!(values(&series, DEPARTURES), vec![Some(2.0), Some(1.0)]);
        assert_eq!(values(&series, ARRIVALS), vec![Some(1.0), Some(0.0)]);
        assert_eq!(values(&series, UNIQUE_VESSELS), vec![Some(2.0), Some(1.0)]);
    }

    #[test]
    fn without_event_column_every_row_is_a_departure() {
        let ev = events(&[("2024-03-01", None, None), ("2024-03-01", None, None)], false, false);
        let series = into_series(&daily_counts(&ev).unwrap()).unwrap();
        assert_eq!(series.column_names(), vec![DEPARTURES]);
        assert_eq!(values(&series, DEPARTURES), vec![Some(2.0)]);
    }

    #[test]
    fn default_options() {
        let options = AisOptions::default();
        assert_eq!(options.time_column, "timestamp");
        assert_eq!(options.event_column, "event_type");
    }
}
