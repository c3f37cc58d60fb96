//! Seed resolution.
//!
//! Iteration `k` of a model uses `seeds[k]` when the model lists one, and a
//! fresh draw from the shared `SeedSource` otherwise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Process-wide generator for seeds that were not supplied explicitly.
#[derive(Debug)]
pub struct SeedSource {
    rng: Mutex<StdRng>,
}

impl SeedSource {
    /// Seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible draws for a whole batch.
    pub fn from_master_seed(master: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(master)),
        }
    }

    pub fn new(master: Option<u64>) -> Self {
        master.map_or_else(Self::from_entropy, Self::from_master_seed)
    }

    /// Uniform in `[0, i32::MAX)`.
    pub fn draw(&self) -> i32 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0..i32::MAX)
    }
}

impl Default for SeedSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Seed for iteration `k`.
pub fn resolve_seed(seeds: Option<&[i32]>, k: usize, source: &SeedSource) -> i32 {
    match seeds.and_then(|list| list.get(k)) {
        Some(&seed) => seed,
        None => source.draw(),
    }
}
