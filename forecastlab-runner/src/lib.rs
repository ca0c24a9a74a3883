//! ForecastLab Runner — estimators, walk-forward backtests, artifacts, scenarios.
//!
//! This crate builds on `forecastlab-core` to provide:
//! - TOML pipeline configuration with validation and a content hash
//! - The fit/predict estimator capability, a train-only median imputer and
//!   the built-in models (mean, ridge, random forest, gradient boosting)
//! - Expanding-window walk-forward evaluation plus full-history refit
//! - Forecast error metrics
//! - CSV/JSON persistence of backtests, forecasts, models and run summaries
//! - Pipeline orchestration and what-if scenario shocks

pub mod config;
pub mod estimator;
pub mod export;
pub mod metrics;
pub mod pipeline;
pub mod scenario;
pub mod walk_forward;

pub use config::{ConfigError, DataConfig, OutputConfig, PipelineConfig, TrainingConfig};
pub use estimator::{Estimator, EstimatorError, ModelArtifact, ModelKind, Predictor};
pub use export::{ModelFile, RunEntry, RunSummary, SCHEMA_VERSION};
pub use metrics::ErrorMetrics;
pub use pipeline::{assemble, build_features, load_features, run, scenario, train, PipelineError};
pub use scenario::{run_scenario, ScenarioError, ScenarioOutcome, ScenarioRecord, ShockSet};
pub use walk_forward::{
    create_splits, run_walk_forward, WalkForwardConfig, WalkForwardError, WalkForwardResult,
    WalkForwardSplit,
};
