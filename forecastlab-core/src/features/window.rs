//! Lag and rolling-window features.
//!
//! Both read only rows at or before `t`. Missing base cells stay missing in
//! a lag, and are skipped by a rolling aggregate.

use serde::{Deserialize, Serialize};

/// A derived column computed from one base column.
pub trait ColumnFeature {
    /// Output column name.
    fn name(&self) -> &str;

    /// Number of leading rows that cannot have a value by construction.
    fn lookback(&self) -> usize;

    /// One output value per input row.
    fn compute(&self, base: &[Option<f64>]) -> Vec<Option<f64>>;
}

// ─── Lag ─────────────────────────────────────────────────────────────

/// `base(t - k)`. The first `k` rows are missing and stay missing.
#[derive(Debug, Clone)]
pub struct Lag {
    k: usize,
    name: String,
}

impl Lag {
    pub fn new(base: &str, k: u32) -> Self {
        Self {
            k: k as usize,
            name: format!("{base}_lag{k}"),
        }
    }
}

impl ColumnFeature for Lag {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.k
    }

    fn compute(&self, base: &[Option<f64>]) -> Vec<Option<f64>> {
        (0..base.len())
            .map(|t| t.checked_sub(self.k).and_then(|src| base[src]))
            .collect()
    }
}

// ─── Rolling ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
}

impl Aggregation {
    fn suffix(&self) -> &'static str {
        match self {
            Aggregation::Mean => "ma",
            Aggregation::Sum => "sum",
        }
    }
}

/// Aggregate over rows `[t - w + 1, t]` clipped to the start of the table.
///
/// Early rows use a partial window, and a window needs only one observed
/// cell to produce a value.
#[derive(Debug, Clone)]
pub struct Rolling {
    window: usize,
    agg: Aggregation,
    name: String,
}

impl Rolling {
    pub fn new(base: &str, window: usize, agg: Aggregation) -> Self {
        Self {
            window,
            agg,
            name: format!("{base}_{}{window}", agg.suffix()),
        }
    }
}

impl ColumnFeature for Rolling {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, base: &[Option<f64>]) -> Vec<Option<f64>> {
        let w = self.window.max(1);
        (0..base.len())
            .map(|t| {
                let start = (t + 1).saturating_sub(w);
                let (sum, count) = base[start..=t]
                    .iter()
                    .flatten()
                    .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                if count == 0 {
                    return None;
                }
                Some(match self.agg {
                    Aggregation::Mean => sum / count as f64,
                    Aggregation::Sum => sum,
                })
            })
            .collect()
    }
}
