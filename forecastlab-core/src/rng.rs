//! Deterministic seed hierarchy.
//!
//! A master seed expands into sub-seeds for each `(model, horizon, index)`
//! via BLAKE3, so a forest's tree `i` gets the same seed no matter which
//! thread builds it or in what order models and horizons are run.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed for `(scope, horizon, index)`. Independent of call order.
    pub fn sub_seed(&self, scope: &str, horizon: u32, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(scope.as_bytes());
        hasher.update(&[0]);
        hasher.update(&horizon.to_le_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, scope: &str, horizon: u32, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(scope, horizon, index))
    }
}
