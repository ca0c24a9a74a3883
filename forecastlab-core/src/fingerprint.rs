//! Content fingerprints for run summaries.
//!
//! A run is reproducible when its dataset hash, config hash and seed match.
//! The dataset hash covers the axis, every column name and role, and the
//! bit pattern of every cell, so two tables hash equal only if they would
//! train identical models.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Frame, TrainableTable};

/// BLAKE3 hex digest of a trainable table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetHash(pub String);

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn dataset_hash(table: &TrainableTable) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(table.anchor().as_bytes());
    hash_frame(&mut hasher, table.frame());
    DatasetHash(hasher.finalize().to_hex().to_string())
}

fn hash_frame(hasher: &mut blake3::Hasher, frame: &Frame) {
    hasher.update(&(frame.height() as u64).to_le_bytes());
    for date in frame.dates() {
        hasher.update(date.to_string().as_bytes());
    }
    for column in frame.columns() {
        hasher.update(column.name.as_bytes());
        hasher.update(&[0]);
        hasher.update(format!("{:?}", column.role).as_bytes());
        for value in &column.values {
            match value {
                Some(v) => {
                    hasher.update(&[1]);
                    hasher.update(&v.to_bits().to_le_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
    }
}

/// BLAKE3 hex digest of arbitrary bytes (e.g. a canonical JSON config).
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
