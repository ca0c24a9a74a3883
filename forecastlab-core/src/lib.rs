//! ForecastLab Core — daily series, calendar alignment, leakage-safe features.
//!
//! This crate contains the data side of the forecasting pipeline:
//! - Domain types (daily series, frames, aligned/feature/trainable tables,
//!   feature matrices, backtest and forecast records)
//! - Series loading from CSV (required/optional sources, renaming, coercion)
//! - Calendar alignment of asynchronous sources onto one contiguous daily axis
//! - Calendar, lag and rolling-window feature synthesis
//! - Forward-shifted horizon targets and the trainable-row filter
//! - Dataset fingerprints and deterministic seed derivation

pub mod data;
pub mod domain;
pub mod features;
pub mod fingerprint;
pub mod rng;
