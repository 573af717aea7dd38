//! Deterministic random number generation.
//!
//! RULE: Nothing in the core may call any platform RNG.
//! All draws flow through a RandomSource, normally a SeededRng built
//! from an explicit seed, so every pull is reproducible under test.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// The draw operations the reward engines need.
/// Tests implement this directly to rig specific outcomes.
pub trait RandomSource {
    /// Roll a float in [0.0, 1.0).
    fn next_f64(&mut self) -> f64;

    /// Roll a u64 in [0, n).
    fn next_u64_below(&mut self, n: u64) -> u64;

    /// Roll an i64 in [min, max] inclusive.
    fn roll_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        min + self.next_u64_below((max - min + 1) as u64) as i64
    }

    /// Bernoulli trial: returns true with probability p.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// A deterministic PCG stream.
pub struct SeededRng {
    inner: Pcg64Mcg,
}

impl SeededRng {
    pub fn seed_from(seed: u64) -> Self {
        Self { inner: Pcg64Mcg::seed_from_u64(seed) }
    }
}

impl RandomSource for SeededRng {
    fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }
}
