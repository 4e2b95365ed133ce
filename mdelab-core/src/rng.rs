//! Deterministic RNG hierarchy.
//!
//! A master seed generates deterministic sub-seeds for each
//! `(stream, sample_size, emulation)` tuple. Sub-seeds are derived via BLAKE3
//! hashing, independently of thread scheduling order, so a seeded power search
//! produces identical results regardless of thread count.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Stream label used by the power search for control/treatment draws.
pub const POWER_STREAM: &str = "power";

/// Stream label used by the statistic bootstrap.
pub const BOOTSTRAP_STREAM: &str = "bootstrap";

/// Deterministic RNG hierarchy.
///
/// The master seed is expanded into per-(stream, sample size, emulation)
/// sub-seeds using BLAKE3. Because derivation is hash-based (not
/// order-dependent), emulations can run on any worker in any order.
#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Hierarchy with a master seed taken from the thread RNG.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a deterministic sub-seed for a specific (stream, sample size, emulation).
    pub fn sub_seed(&self, stream: &str, sample_size: usize, emulation: usize) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(stream.as_bytes());
        hasher.update(&(sample_size as u64).to_le_bytes());
        hasher.update(&(emulation as u64).to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Create a seeded StdRng from a sub-seed.
    pub fn rng_for(&self, stream: &str, sample_size: usize, emulation: usize) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(stream, sample_size, emulation))
    }
}
