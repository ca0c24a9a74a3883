//! Artifact persistence — CSV record tables, model JSON and the run summary.
//!
//! File names carry the horizon and model id but no timestamp, so rerunning
//! an identical configuration overwrites byte-identical files. JSON
//! artifacts include a `schema_version`; newer versions are rejected on load.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use forecastlab_core::domain::{BacktestRecord, ForecastRecord};
use forecastlab_core::fingerprint::DatasetHash;

use crate::estimator::{ModelArtifact, ModelKind};
use crate::metrics::ErrorMetrics;
use crate::scenario::ScenarioRecord;

pub const SCHEMA_VERSION: u32 = 1;

// ─── Paths ──────────────────────────────────────────────────────────

pub fn backtest_path(dir: &Path, horizon: u32, model: ModelKind) -> PathBuf {
    dir.join(format!("backtest_h{horizon}_{model}.csv"))
}

pub fn forecast_path(dir: &Path, horizon: u32, model: ModelKind) -> PathBuf {
    dir.join(format!("forecast_h{horizon}_{model}.csv"))
}

pub fn scenario_path(dir: &Path, horizon: u32, model: ModelKind) -> PathBuf {
    dir.join(format!("scenario_h{horizon}_{model}.csv"))
}

pub fn model_path(dir: &Path, horizon: u32, model: ModelKind) -> PathBuf {
    dir.join("models").join(format!("{model}_h{horizon}.json"))
}

pub fn summary_path(dir: &Path) -> PathBuf {
    dir.join("summary.json")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: date_input, target_date, y_true, y_hat
pub fn export_backtest_csv(records: &[BacktestRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date_input", "target_date", "y_true", "y_hat"])?;
    for r in records {
        wtr.write_record([
            r.date_input.to_string(),
            r.target_date.to_string(),
            r.y_true.to_string(),
            r.y_hat.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: date_input, target_date, y_hat
pub fn export_forecast_csv(records: &[ForecastRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date_input", "target_date", "y_hat"])?;
    for r in records {
        wtr.write_record([
            r.date_input.to_string(),
            r.target_date.to_string(),
            r.y_hat.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: date_input, target_date, y_hat_scn
pub fn export_scenario_csv(records: &[ScenarioRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date_input", "target_date", "y_hat_scn"])?;
    for r in records {
        wtr.write_record([
            r.date_input.to_string(),
            r.target_date.to_string(),
            r.y_hat_scn.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Read a backtest CSV written by [`export_backtest_csv`].
pub fn import_backtest_csv(path: &Path) -> Result<Vec<BacktestRecord>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for row in rdr.deserialize() {
        let record: BacktestRecord =
            row.with_context(|| format!("malformed backtest row in {}", path.display()))?;
        records.push(record);
    }
    Ok(records)
}

// ─── Model files ────────────────────────────────────────────────────

/// A fitted final model plus what it needs to be applied again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub schema_version: u32,
    pub model: ModelKind,
    pub horizon: u32,
    /// Feature columns, in the order the model expects them.
    pub feature_columns: Vec<String>,
    pub artifact: ModelArtifact,
}

impl ModelFile {
    pub fn new(model: ModelKind, horizon: u32, feature_columns: Vec<String>, artifact: ModelArtifact) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            model,
            horizon,
            feature_columns,
            artifact,
        }
    }
}

pub fn save_model(file: &ModelFile, path: &Path) -> Result<()> {
    let json = serde_json::to_string(file).context("failed to serialize model")?;
    write_text(path, &json)
}

pub fn load_model(path: &Path) -> Result<ModelFile> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read model {}", path.display()))?;
    let file: ModelFile = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse model {}", path.display()))?;
    if file.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} in {} (max supported: {})",
            file.schema_version,
            path.display(),
            SCHEMA_VERSION
        );
    }
    Ok(file)
}

// ─── Run summary ────────────────────────────────────────────────────

/// Metrics and fingerprints for one `train` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,
    pub dataset_hash: DatasetHash,
    pub config_hash: String,
    pub seed: u64,
    pub anchor: String,
    pub runs: Vec<RunEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub horizon: u32,
    pub model: ModelKind,
    pub trainable_rows: usize,
    pub folds: usize,
    pub metrics: ErrorMetrics,
}

pub fn export_summary(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize run summary")
}

pub fn import_summary(json: &str) -> Result<RunSummary> {
    let summary: RunSummary =
        serde_json::from_str(json).context("failed to deserialize run summary")?;
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(summary)
}

/// Write `content` to `path`, creating parent directories.
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
    }

    #[test]
    fn backtest_csv_layout() {
        let csv = export_backtest_csv(&[BacktestRecord {
            date_input: d(1),
            target_date: d(8),
            y_true: 2.5,
            y_hat: 2.75,
        }])
        .unwrap();
        assert_eq!(csv, "date_input,target_date,y_true,y_hat\n2024-02-01,2024-02-08,2.5,2.75\n");
    }

    #[test]
    fn forecast_csv_layout() {
        let csv = export_forecast_csv(&[ForecastRecord {
            date_input: d(3),
            target_date: d(10),
            y_hat: 10.0,
        }])
        .unwrap();
        assert_eq!(csv, "date_input,target_date,y_hat\n2024-02-03,2024-02-10,10\n");
    }

    #[test]
    fn empty_backtest_still_has_header() {
        assert_eq!(
            export_backtest_csv(&[]).unwrap(),
            "date_input,target_date,y_true,y_hat\n"
        );
    }

    #[test]
    fn backtest_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = backtest_path(dir.path(), 7, ModelKind::Ridge);
        let records = vec![BacktestRecord {
            date_input: d(1),
            target_date: d(8),
            y_true: 3.141592653589793,
            y_hat: -0.1,
        }];
        write_text(&path, &export_backtest_csv(&records).unwrap()).unwrap();
        assert_eq!(import_backtest_csv(&path).unwrap(), records);
    }

    #[test]
    fn file_names_follow_horizon_and_model() {
        let dir = Path::new("out");
        assert_eq!(backtest_path(dir, 7, ModelKind::Gbm), Path::new("out/backtest_h7_gbm.csv"));
        assert_eq!(forecast_path(dir, 30, ModelKind::Rf), Path::new("out/forecast_h30_rf.csv"));
        assert_eq!(model_path(dir, 7, ModelKind::Ridge), Path::new("out/models/ridge_h7.json"));
        assert_eq!(scenario_path(dir, 7, ModelKind::Mean), Path::new("out/scenario_h7_mean.csv"));
    }

    #[test]
    fn model_file_round_trip_and_version_gate() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_path(dir.path(), 7, ModelKind::Mean);
        let file = ModelFile::new(
            ModelKind::Mean,
            7,
            vec!["henry_hub".into()],
            ModelArtifact::Constant { value: 3.25 },
        );
        save_model(&file, &path).unwrap();
        assert_eq!(load_model(&path).unwrap(), file);

        let mut future = file;
        future.schema_version = SCHEMA_VERSION + 1;
        std::fs::write(&path, serde_json::to_string(&future).unwrap()).unwrap();
        assert!(load_model(&path).unwrap_err().to_string().contains("unsupported schema version"));
    }

    #[test]
    fn summary_round_trip() {
        let summary = RunSummary {
            schema_version: SCHEMA_VERSION,
            dataset_hash: DatasetHash("abc".into()),
            config_hash: "def".into(),
            seed: 42,
            anchor: "henry_hub".into(),
            runs: vec![RunEntry {
                horizon: 7,
                model: ModelKind::Ridge,
                trainable_rows: 100,
                folds: 3,
                metrics: ErrorMetrics::compute(&[]),
            }],
        };
        let json = export_summary(&summary).unwrap();
        assert!(json.contains("\"schema_version\": 1"));
        assert_eq!(import_summary(&json).unwrap(), summary);
    }
}
