//! Source specifications and structured data errors.
//!
//! Sources are a closed set of roles (anchor / required / optional) with an
//! explicit rename contract, so the loader never has to guess what a file is
//! for from its column layout.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{SeriesError, TableError};

/// How a missing source file is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Defines the calendar and the forecast target. Always required.
    Anchor,
    /// Must exist; absence aborts the run.
    Required,
    /// Silently skipped when absent.
    #[default]
    Optional,
}

impl SourceKind {
    pub fn is_required(&self) -> bool {
        !matches!(self, SourceKind::Optional)
    }
}

/// One tabular input: a `date` column plus value columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub kind: SourceKind,
    /// `file column -> table column` renames, applied before merging.
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    /// Keep only these columns (post-rename). All value columns when unset.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
            rename: BTreeMap::new(),
            columns: None,
        }
    }

    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename.insert(from.into(), to.into());
        self
    }
}

/// The anchor source plus the name of its forecast column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorSpec {
    pub name: String,
    pub path: PathBuf,
    /// Column holding the anchor value. If the file lacks it but has exactly
    /// one value column, that column is renamed to this name.
    pub column: String,
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
}

impl AnchorSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            column: column.into(),
            rename: BTreeMap::new(),
        }
    }

    pub fn as_source(&self) -> SourceSpec {
        SourceSpec {
            name: self.name.clone(),
            path: self.path.clone(),
            kind: SourceKind::Anchor,
            rename: self.rename.clone(),
            columns: None,
        }
    }
}

/// Structured error types for data operations.
///
/// Every variant carries the identity of the offending input.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("missing required source '{name}': {path}")]
    MissingSource { name: String, path: String },

    #[error("failed to read '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error("failed to write '{path}': {reason}")]
    Write { path: String, reason: String },

    #[error("source '{name}' has no 'date' column")]
    MissingDateColumn { name: String },

    #[error("source '{name}' line {line}: unparseable date '{value}'")]
    InvalidDate {
        name: String,
        line: usize,
        value: String,
    },

    #[error("source '{name}': column '{column}' not found")]
    MissingColumn { name: String, column: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("no rows returned for series '{series}'")]
    EmptyResponse { series: String },

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Table(#[from] TableError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_is_the_default_kind() {
        let spec: SourceSpec = serde_json::from_str(r#"{"name":"eu","path":"data/eu.csv"}"#).unwrap();
        assert_eq!(spec.kind, SourceKind::Optional);
        assert!(!spec.kind.is_required());
        assert!(SourceKind::Anchor.is_required());
    }

    #[test]
    fn anchor_as_source_is_required() {
        let anchor = AnchorSpec::new("hh", "data/hh.csv", "henry_hub");
        assert_eq!(anchor.as_source().kind, SourceKind::Anchor);
    }

    #[test]
    fn missing_source_names_the_file() {
        let err = DataError::MissingSource {
            name: "pjm".into(),
            path: "data/pjm_fuel_daily.csv".into(),
        };
        assert_eq!(
            err.to_string(),
            "missing required source 'pjm': data/pjm_fuel_daily.csv"
        );
    }
}
