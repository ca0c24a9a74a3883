//! Serializable pipeline configuration.
//!
//! One `PipelineConfig` describes a whole run: which files feed the aligner,
//! how features are derived, which (horizon, model) pairs are backtested and
//! where artifacts land. It is loaded from TOML and passed to each stage
//! explicitly; nothing is read from global state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use forecastlab_core::data::{AnchorSpec, SourceKind, SourceSpec};
use forecastlab_core::features::{FeatureConfig, FeatureError};
use forecastlab_core::fingerprint::content_hash;

use crate::estimator::ModelKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("failed to serialize config for hashing")]
    Serialize(#[from] serde_json::Error),
}

/// Complete configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub anchor: AnchorSpec,
    /// Auxiliary sources, merged in order.
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Forecast horizons in days.
    pub horizons: Vec<u32>,
    pub models: Vec<ModelKind>,
    /// Rows in the first training window.
    pub min_train_days: usize,
    /// Rows per test window; the training window grows by this much per fold.
    pub step: usize,
    /// Trailing rows the final model forecasts. 0 forecasts every row.
    pub forecast_rows: usize,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            horizons: vec![7, 30],
            models: vec![ModelKind::Gbm, ModelKind::Rf, ModelKind::Ridge],
            min_train_days: 365,
            step: 7,
            forecast_rows: 30,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Backtests, forecasts, models and the run summary go here.
    pub dir: PathBuf,
    /// Where `build-features` writes, and `train` reads, the trainable table.
    pub features_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("outputs"),
            features_file: PathBuf::from("data/features.csv"),
        }
    }
}

impl PipelineConfig {
    /// A config with default features/training/output for one anchor file.
    pub fn for_anchor(anchor: AnchorSpec) -> Self {
        Self {
            data: DataConfig {
                anchor,
                sources: Vec::new(),
            },
            features: FeatureConfig::default(),
            training: TrainingConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Positivity and non-emptiness checks only.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.features.validate()?;
        let t = &self.training;
        if t.horizons.is_empty() {
            return Err(FeatureError::NoHorizons.into());
        }
        if let Some(&horizon) = t.horizons.iter().find(|&&h| h == 0) {
            return Err(FeatureError::InvalidHorizon { horizon }.into());
        }
        if t.models.is_empty() {
            return Err(ConfigError::Invalid("training.models must not be empty".into()));
        }
        if t.min_train_days == 0 {
            return Err(ConfigError::Invalid("training.min_train_days must be positive".into()));
        }
        if t.step == 0 {
            return Err(ConfigError::Invalid("training.step must be positive".into()));
        }
        if self.data.anchor.column.trim().is_empty() {
            return Err(ConfigError::Invalid("data.anchor.column must not be empty".into()));
        }
        if let Some(source) = self.data.sources.iter().find(|s| s.kind == SourceKind::Anchor) {
            return Err(ConfigError::Invalid(format!(
                "source '{}': only data.anchor may have kind 'anchor'",
                source.name
            )));
        }
        let mut names = vec![self.data.anchor.name.as_str()];
        for source in &self.data.sources {
            if names.contains(&source.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            names.push(&source.name);
        }
        Ok(())
    }

    /// BLAKE3 over the canonical JSON form; recorded in the run summary.
    ///
    /// Fails when a path is not valid UTF-8, since JSON cannot carry it.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_vec(self)?;
        Ok(content_hash(&json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecastlab_core::features::Aggregation;

    const SAMPLE: &str = r#"
[data.anchor]
name = "henry_hub"
path = "data/external/henry_hub.csv"
column = "henry_hub"

[[data.sources]]
name = "pjm"
path = "data/external/pjm_fuel_daily.csv"
kind = "required"

[[data.sources]]
name = "cpc610"
path = "data/external/cpc_610_us.csv"
rename = { index = "cpc_610_idx" }

[features]
lags = [1, 2, 7, 14]
lag_columns = ["gas_share"]
rolling = [
    { window = 7 },
    { column = "departures", window = 14, agg = "sum" },
]

[training]
horizons = [7]
models = ["ridge", "hgb"]
min_train_days = 120
"#;

    #[test]
    fn parses_sample_with_defaults_filled() {
        let config = PipelineConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.data.sources.len(), 2);
        assert_eq!(config.data.sources[0].kind, SourceKind::Required);
        assert_eq!(config.data.sources[1].kind, SourceKind::Optional);
        assert_eq!(config.data.sources[1].rename["index"], "cpc_610_idx");
        assert_eq!(config.features.lags, vec![1, 2, 7, 14]);
        assert_eq!(config.features.rolling[1].agg, Aggregation::Sum);
        assert_eq!(config.features.rolling[0].column, None);
        assert_eq!(config.training.models, vec![ModelKind::Ridge, ModelKind::Gbm]);
        assert_eq!(config.training.min_train_days, 120);
        // untouched fields keep their defaults
        assert_eq!(config.training.step, 7);
        assert_eq!(config.training.forecast_rows, 30);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::for_anchor(AnchorSpec::new("hh", "hh.csv", "henry_hub"));
        assert_eq!(config.training.horizons, vec![7, 30]);
        assert_eq!(config.features.lags, vec![1, 7, 14]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_non_positive_settings() {
        let base = PipelineConfig::for_anchor(AnchorSpec::new("hh", "hh.csv", "henry_hub"));

        let mut c = base.clone();
        c.training.horizons = vec![7, 0];
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Feature(FeatureError::InvalidHorizon { horizon: 0 }))
        ));

        let mut c = base.clone();
        c.training.step = 0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));

        let mut c = base.clone();
        c.training.models.clear();
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));

        let mut c = base.clone();
        c.features.lags = vec![0];
        assert!(matches!(c.validate(), Err(ConfigError::Feature(_))));

        let mut c = base;
        c.data.sources.push(SourceSpec::new("hh", "other.csv", SourceKind::Optional));
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn unknown_model_is_a_parse_error() {
        let toml = SAMPLE.replace(r#"["ridge", "hgb"]"#, r#"["ridge", "xgb"]"#);
        assert!(matches!(PipelineConfig::from_toml(&toml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn config_hash_tracks_content() {
        let a = PipelineConfig::from_toml(SAMPLE).unwrap();
        let mut b = a.clone();
        assert_eq!(a.config_hash().unwrap(), b.config_hash().unwrap());
        b.training.seed = 7;
        assert_ne!(a.config_hash().unwrap(), b.config_hash().unwrap());
        assert_eq!(a.config_hash().unwrap().len(), 64);
    }

    #[cfg(unix)]
    #[test]
    fn unhashable_path_is_an_error_not_an_empty_hash() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let mut config = PipelineConfig::from_toml(SAMPLE).unwrap();
        config.output.dir = PathBuf::from(OsStr::from_bytes(b"outputs-\xff"));
        assert!(matches!(config.config_hash(), Err(ConfigError::Serialize(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/forecastlab.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/forecastlab.toml"));
    }
}
