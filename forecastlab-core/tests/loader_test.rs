//! Integration tests for source loading and feature-table persistence,
//! using the CSV fixtures under `tests/fixtures`.

use chrono::NaiveDate;
use std::path::PathBuf;
use forecastlab_core::data::{
    aggregate_ais, align, load_anchor, load_source, load_sources, read_series_csv, read_trainable_csv,
    write_series_csv, write_trainable_csv, AisOptions, AnchorSpec, DataError, SourceKind,
    SourceSpec,
};
use forecastlab_core::domain::ColumnRole;
use forecastlab_core::features::{construct_targets, FeatureSynthesizer};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn anchor_spec() -> AnchorSpec {
    AnchorSpec::new("henry_hub", fixture("henry_hub.csv"), "henry_hub")
}

fn aux_specs() -> Vec<SourceSpec> {
    vec![
        SourceSpec::new("pjm", fixture("pjm_fuel_daily.csv"), SourceKind::Required),
        SourceSpec::new("eu", fixture("eu_storage.csv"), SourceKind::Optional),
        SourceSpec::new("cpc610", fixture("cpc_610_us.csv"), SourceKind::Optional)
            .with_rename("index", "cpc_610_idx"),
        SourceSpec::new("cpc814", fixture("cpc_814_us.csv"), SourceKind::Optional)
            .with_rename("index", "cpc_814_idx"),
    ]
}

#[test]
fn anchor_loads_sorted_with_datetime_rows_truncated_to_dates() {
    let hh = load_anchor(&anchor_spec()).unwrap();
    assert_eq!(hh.len(), 43);
    assert_eq!(hh.first_date(), Some(date(2024, 1, 2)));
    assert_eq!(hh.last_date(), Some(date(2024, 2, 29)));
    // stored as 2024-01-09T00:00:00 in the file
    assert_eq!(hh.value_at("henry_hub", date(2024, 1, 9)), Some(2.802));
}

#[test]
fn single_value_column_is_inferred_as_anchor() {
    let spec = AnchorSpec::new("hh", fixture("henry_hub_single.csv"), "henry_hub");
    let hh = load_anchor(&spec).unwrap();
    assert_eq!(hh.column_names(), vec!["henry_hub"]);
    assert_eq!(hh.len(), 10);
}

#[test]
fn anchor_without_inferable_column_fails() {
    let spec = AnchorSpec::new("pjm", fixture("pjm_fuel_daily.csv"), "henry_hub");
    match load_anchor(&spec) {
        Err(DataError::MissingColumn { name, column }) => {
            assert_eq!(name, "pjm");
            assert_eq!(column, "henry_hub");
        }
        other => panic!("expected MissingColumn, got {other:?}"),
    }
}

#[test]
fn missing_required_source_names_it() {
    let spec = SourceSpec::new("pjm", fixture("does_not_exist.csv"), SourceKind::Required);
    match load_source(&spec) {
        Err(DataError::MissingSource { name, path }) => {
            assert_eq!(name, "pjm");
            assert!(path.ends_with("does_not_exist.csv"));
        }
        other => panic!("expected MissingSource, got {other:?}"),
    }
}

#[test]
fn missing_optional_source_is_skipped() {
    let loaded = load_sources(&anchor_spec(), &aux_specs()).unwrap();
    assert_eq!(loaded.auxiliary.len(), 3);
    assert_eq!(loaded.skipped, vec!["cpc814".to_string()]);
}

#[test]
fn rename_and_silent_coercion() {
    let loaded = load_sources(&anchor_spec(), &aux_specs()).unwrap();
    let cpc = loaded.auxiliary.iter().find(|s| s.name() == "cpc610").unwrap();
    assert_eq!(cpc.column_names(), vec!["cpc_610_idx"]);

    let pjm = loaded.auxiliary.iter().find(|s| s.name() == "pjm").unwrap();
    assert_eq!(pjm.value_at("gas_share", date(2024, 1, 15)), None);
    assert!(pjm.value_at("coal_share", date(2024, 1, 15)).is_some());
}

#[test]
fn duplicate_dates_keep_first_occurrence() {
    let eu = read_series_csv(&fixture("eu_storage.csv"), "eu").unwrap();
    assert_eq!(eu.dates(), &[date(2024, 1, 10), date(2024, 1, 20), date(2024, 2, 1)]);
    assert_eq!(eu.value_at("level_pct", date(2024, 1, 20)), Some(80.5));
}

#[test]
fn unparseable_date_reports_line() {
    match read_series_csv(&fixture("bad_dates.csv"), "bad") {
        Err(DataError::InvalidDate { name, line, value }) => {
            assert_eq!(name, "bad");
            assert_eq!(line, 3);
            assert_eq!(value, "2024-13-45");
        }
        other => panic!("expected InvalidDate, got {other:?}"),
    }
}

#[test]
fn columns_filter_requires_presence() {
    let mut spec = SourceSpec::new("pjm", fixture("pjm_fuel_daily.csv"), SourceKind::Required);
    spec.columns = Some(vec!["coal_share".into()]);
    let pjm = load_source(&spec).unwrap().unwrap();
    assert_eq!(pjm.column_names(), vec!["coal_share"]);

    spec.columns = Some(vec!["oil_share".into()]);
    assert!(matches!(load_source(&spec), Err(DataError::MissingColumn { .. })));
}

#[test]
fn series_csv_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/eu.csv");
    let eu = read_series_csv(&fixture("eu_storage.csv"), "eu").unwrap();
    write_series_csv(&eu, &path).unwrap();
    let back = read_series_csv(&path, "eu").unwrap();
    assert_eq!(back, eu);
}

#[test]
fn feature_table_persists_and_reloads_with_roles() {
    let loaded = load_sources(&anchor_spec(), &aux_specs()).unwrap();
    let aligned = align(&loaded.anchor, "henry_hub", &loaded.auxiliary).unwrap();
    let features = FeatureSynthesizer::default().synthesize(aligned).unwrap();
    let trainable = construct_targets(features, &[7, 30]).unwrap();
    assert!(!trainable.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("features.csv");
    write_trainable_csv(&trainable, &path).unwrap();

    let back = read_trainable_csv(&path, "henry_hub", &[7, 30]).unwrap();
    assert_eq!(back.height(), trainable.height());
    assert_eq!(back.frame().dates(), trainable.frame().dates());
    assert_eq!(back.feature_names(), trainable.feature_names());

    for (orig, read) in trainable.frame().columns().iter().zip(back.frame().columns()) {
        assert_eq!(orig.name, read.name);
        assert_eq!(orig.role, read.role, "role of {}", orig.name);
        for (a, b) in orig.values.iter().zip(&read.values) {
            match (a, b) {
                (Some(a), Some(b)) => assert!((a - b).abs() < 1e-9, "{}: {a} vs {b}", orig.name),
                (None, None) => {}
                _ => panic!("{}: presence mismatch {a:?} vs {b:?}", orig.name),
            }
        }
    }

    let ds = back.dataset(30).unwrap();
    assert_eq!(ds.len(), back.height());
    assert!(!ds.features().column_names().iter().any(|c| c.starts_with("target_t+")));
}

#[test]
fn reading_features_without_requested_target_fails() {
    let loaded = load_sources(&anchor_spec(), &aux_specs()).unwrap();
    let aligned = align(&loaded.anchor, "henry_hub", &loaded.auxiliary).unwrap();
    let features = FeatureSynthesizer::default().synthesize(aligned).unwrap();
    let trainable = construct_targets(features, &[7]).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("features.csv");
    write_trainable_csv(&trainable, &path).unwrap();

    let err = read_trainable_csv(&path, "henry_hub", &[7, 14]).unwrap_err();
    assert!(err.to_string().contains("target_t+14"), "{err}");
}

#[test]
fn aligned_fixture_spans_anchor_calendar() {
    let loaded = load_sources(&anchor_spec(), &aux_specs()).unwrap();
    let aligned = align(&loaded.anchor, "henry_hub", &loaded.auxiliary).unwrap();
    assert_eq!(aligned.height(), 59);
    let frame = aligned.frame();
    assert_eq!(frame.column("henry_hub").unwrap().role, ColumnRole::Anchor);
    // Jan 6th is a Saturday: anchor stays missing, exogenous columns are filled
    let sat = frame.row_of(date(2024, 1, 6)).unwrap();
    assert_eq!(frame.column("henry_hub").unwrap().values[sat], None);
    for name in ["gas_share", "coal_share", "level_pct", "cpc_610_idx"] {
        assert!(
            frame.column(name).unwrap().values.iter().all(Option::is_some),
            "{name} has gaps"
        );
    }
    // gas_share 'n/a' on Jan 15 forward-filled from Jan 14
    let row = frame.row_of(date(2024, 1, 15)).unwrap();
    let gas = &frame.column("gas_share").unwrap().values;
    assert_eq!(gas[row], gas[row - 1]);
}

#[test]
fn ais_events_aggregate_to_daily_counts() {
    let inputs = [fixture("ais_events_a.csv"), fixture("ais_events_b.csv")];
    let daily = aggregate_ais(&inputs, &AisOptions::default()).unwrap();
    assert_eq!(daily.name(), "ais");
    assert_eq!(daily.dates(), &[date(2024, 1, 2), date(2024, 1, 3), date(2024, 1, 4)]);
    let counts = |name: &str| daily.column(name).unwrap().values.clone();
    assert_eq!(counts("departures"), vec![Some(1.0), Some(2.0), Some(0.0)]);
    assert_eq!(counts("arrivals"), vec![Some(1.0), Some(1.0), Some(1.0)]);
    // blank MMSI on the moored row is not a vessel
    assert_eq!(counts("unique_vessels"), vec![Some(2.0), Some(2.0), Some(1.0)]);
}

#[test]
fn aggregated_ais_persists_as_a_source_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("external/ais_daily.csv");
    let daily = aggregate_ais(&[fixture("ais_events_a.csv")], &AisOptions::default()).unwrap();
    write_series_csv(&daily, &out).unwrap();

    let spec = SourceSpec::new("ais", out.clone(), SourceKind::Optional);
    let reloaded = load_source(&spec).unwrap().unwrap();
    assert_eq!(reloaded.dates(), daily.dates());
    assert_eq!(reloaded.column_names(), vec!["departures", "arrivals", "unique_vessels"]);
    assert_eq!(reloaded.column("departures").unwrap().values, vec![Some(1.0), Some(2.0)]);
}

#[test]
fn ais_without_timestamp_column_names_the_file() {
    let err = aggregate_ais(&[fixture("henry_hub.csv")], &AisOptions::default()).unwrap_err();
    match err {
        DataError::MissingColumn { name, column } => {
            assert!(name.ends_with("henry_hub.csv"));
            assert_eq!(column, "timestamp");
        }
        other => panic!("unexpected error: {other}"),
    }
}
