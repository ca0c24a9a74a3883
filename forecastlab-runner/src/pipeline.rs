//! Pipeline orchestration: sources -> trainable table -> backtests, forecasts
//! and model artifacts for every (horizon, model) pair.
//!
//! Stages run one after another on in-memory tables. Only estimator fitting
//! parallelises, inside the estimator.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use forecastlab_core::data::{
    align, load_sources, read_trainable_csv, write_trainable_csv, AlignError, DataError,
};
use forecastlab_core::domain::{TableError, TrainableTable};
use forecastlab_core::features::{construct_targets, FeatureError, FeatureSynthesizer};
use forecastlab_core::fingerprint::dataset_hash;
use forecastlab_core::rng::SeedHierarchy;

use crate::config::{ConfigError, PipelineConfig};
use crate::estimator::ModelKind;
use crate::export::{
    backtest_path, export_backtest_csv, export_forecast_csv, export_scenario_csv, export_summary,
    forecast_path, load_model, model_path, save_model, scenario_path, summary_path, write_text,
    ModelFile, RunEntry, RunSummary, SCHEMA_VERSION,
};
use crate::metrics::ErrorMetrics;
use crate::scenario::{run_scenario, ScenarioError, ShockSet};
use crate::walk_forward::{run_walk_forward, WalkForwardConfig, WalkForwardError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Align(#[from] AlignError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("zero trainable rows for horizon {horizon}")]
    ZeroTrainableRows { horizon: u32 },

    #[error("walk-forward failed for horizon {horizon}, model {model}")]
    WalkForward {
        horizon: u32,
        model: ModelKind,
        #[source]
        source: WalkForwardError,
    },

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("artifact I/O failed: {0}")]
    Artifact(String),
}

fn artifact_error(e: anyhow::Error) -> PipelineError {
    PipelineError::Artifact(format!("{e:#}"))
}

// ─── Feature stage ──────────────────────────────────────────────────

/// Load, align, synthesize and attach targets, entirely in memory.
pub fn assemble(config: &PipelineConfig) -> Result<TrainableTable, PipelineError> {
    config.validate()?;
    let loaded = load_sources(&config.data.anchor, &config.data.sources)?;
    let aligned = align(&loaded.anchor, &config.data.anchor.column, &loaded.auxiliary)?;
    let features = FeatureSynthesizer::new(config.features.clone()).synthesize(aligned)?;
    let trainable = construct_targets(features, &config.training.horizons)?;
    info!(
        rows = trainable.height(),
        features = trainable.feature_names().len(),
        skipped_sources = ?loaded.skipped,
        "assembled trainable table"
    );
    Ok(trainable)
}

/// [`assemble`], then persist the table to `output.features_file`.
pub fn build_features(config: &PipelineConfig) -> Result<TrainableTable, PipelineError> {
    let trainable = assemble(config)?;
    write_trainable_csv(&trainable, &config.output.features_file)?;
    Ok(trainable)
}

/// Read back a table written by [`build_features`].
pub fn load_features(config: &PipelineConfig) -> Result<TrainableTable, PipelineError> {
    let table = read_trainable_csv(
        &config.output.features_file,
        &config.data.anchor.column,
        &config.training.horizons,
    )?;
    Ok(table)
}

// ─── Training stage ─────────────────────────────────────────────────

/// Backtest, refit and persist every configured (horizon, model) pair.
///
/// Writes `backtest_h{H}_{model}.csv`, `forecast_h{H}_{model}.csv`,
/// `models/{model}_h{H}.json` and `summary.json` under `output.dir`.
pub fn train(config: &PipelineConfig, table: &TrainableTable) -> Result<RunSummary, PipelineError> {
    config.validate()?;
    let config_hash = config.config_hash()?;
    let training = &config.training;
    let out = config.output.dir.as_path();
    let seeds = SeedHierarchy::new(training.seed);
    let wf = WalkForwardConfig {
        min_train: training.min_train_days,
        step: training.step,
    };

    let mut runs = Vec::with_capacity(training.horizons.len() * training.models.len());
    for &horizon in &training.horizons {
        let dataset = table.dataset(horizon)?;
        if dataset.is_empty() {
            return Err(PipelineError::ZeroTrainableRows { horizon });
        }

        for &model in &training.models {
            let estimator = model.build(seeds.sub_seed(model.id(), horizon, 0));
            let result = run_walk_forward(&dataset, estimator.as_ref(), &wf, training.forecast_rows)
                .map_err(|source| PipelineError::WalkForward {
                    horizon,
                    model,
                    source,
                })?;

            persist(&backtest_path(out, horizon, model), export_backtest_csv(&result.records))?;
            persist(&forecast_path(out, horizon, model), export_forecast_csv(&result.forecasts))?;
            if let Some(artifact) = result.final_model.artifact() {
                let file = ModelFile::new(
                    model,
                    horizon,
                    dataset.features().column_names().to_vec(),
                    artifact,
                );
                save_model(&file, &model_path(out, horizon, model)).map_err(artifact_error)?;
            }

            let metrics = ErrorMetrics::compute(&result.records);
            info!(
                horizon,
                model = model.id(),
                folds = result.splits.len(),
                mae = metrics.mae,
                rmse = metrics.rmse,
                "model evaluated"
            );
            runs.push(RunEntry {
                horizon,
                model,
                trainable_rows: result.trainable_rows,
                folds: result.splits.len(),
                metrics,
            });
        }
    }

    let summary = RunSummary {
        schema_version: SCHEMA_VERSION,
        dataset_hash: dataset_hash(table),
        config_hash,
        seed: training.seed,
        anchor: table.anchor().to_string(),
        runs,
    };
    persist(&summary_path(out), export_summary(&summary))?;
    info!(dir = %out.display(), runs = summary.runs.len(), "training complete");
    Ok(summary)
}

/// `build-features` then `train`, without re-reading the table from disk.
pub fn run(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
    let table = build_features(config)?;
    train(config, &table)
}

// ─── Scenario stage ─────────────────────────────────────────────────

/// Re-predict the last `rows` rows of the saved feature table under `shocks`
/// with the saved `{model}_h{H}` final model. Returns the written CSV path.
pub fn scenario(
    config: &PipelineConfig,
    model: ModelKind,
    horizon: u32,
    shocks: &ShockSet,
    rows: usize,
) -> Result<PathBuf, PipelineError> {
    let out = config.output.dir.as_path();
    let model_file = load_model(&model_path(out, horizon, model)).map_err(artifact_error)?;
    let table = read_trainable_csv(&config.output.features_file, &config.data.anchor.column, &[horizon])?;
    let outcome = run_scenario(&model_file, &table, shocks, rows)?;

    let path = scenario_path(out, horizon, model);
    persist(&path, export_scenario_csv(&outcome.records))?;
    info!(
        path = %path.display(),
        rows = outcome.records.len(),
        applied = ?outcome.applied,
        skipped = ?outcome.skipped,
        "wrote scenario"
    );
    Ok(path)
}

fn persist(path: &Path, content: anyhow::Result<String>) -> Result<(), PipelineError> {
    let content = content.map_err(artifact_error)?;
    write_text(path, &content).map_err(artifact_error)
}
