//! Seedable random sources used by both tree expansion choices and rollouts.
//!
//! Two engines implement the same [`LevelRng`] trait: [`rand_chacha::ChaCha8Rng`] is the
//! production default (reproducible, good statistical quality), and [`rand::rngs::SmallRng`]
//! is a fast, lightweight fallback for callers who don't need the stronger guarantees.

use rand::{Rng, RngCore, SeedableRng};
use rand::rngs::SmallRng;
use rand_chacha::ChaCha8Rng;

pub trait LevelRng {
    /// Uniform integer in `[a, b]` inclusive.
    fn range_i64(&mut self, a: i64, b: i64) -> i64;
    /// Uniform real in `[a, b)`.
    fn range_f64(&mut self, a: f64, b: f64) -> f64;
    /// Reseed this generator from a fresh `u64` seed.
    fn reseed(&mut self, seed: u64);
}

impl LevelRng for ChaCha8Rng {
    fn range_i64(&mut self, a: i64, b: i64) -> i64 {
        self.gen_range(a..=b)
    }
    fn range_f64(&mut self, a: f64, b: f64) -> f64 {
        self.gen_range(a..b)
    }
    fn reseed(&mut self, seed: u64) {
        *self = ChaCha8Rng::seed_from_u64(seed);
    }
}

impl LevelRng for SmallRng {
    fn range_i64(&mut self, a: i64, b: i64) -> i64 {
        self.gen_range(a..=b)
    }
    fn range_f64(&mut self, a: f64, b: f64) -> f64 {
        self.gen_range(a..b)
    }
    fn reseed(&mut self, seed: u64) {
        *self = SmallRng::seed_from_u64(seed);
    }
}

/// Which concrete engine backs a [`LevelRng`], selected from configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngKind {
    ChaCha8,
    Small,
}

pub enum Engine {
    ChaCha8(ChaCha8Rng),
    Small(SmallRng),
}

impl Engine {
    pub fn new(kind: RngKind, seed: u64) -> Engine {
        match kind {
            RngKind::ChaCha8 => Engine::ChaCha8(ChaCha8Rng::seed_from_u64(seed)),
            RngKind::Small => Engine::Small(SmallRng::seed_from_u64(seed)),
        }
    }

    /// Pick a fresh nondeterministic seed, as the production default does when the
    /// configured seed is `0`.
    pub fn fresh_seed() -> u64 {
        rand::thread_rng().next_u64()
    }
}

impl LevelRng for Engine {
    fn range_i64(&mut self, a: i64, b: i64) -> i64 {
        match self {
            Engine::ChaCha8(r) => r.range_i64(a, b),
            Engine::Small(r) => r.range_i64(a, b),
        }
    }
    fn range_f64(&mut self, a: f64, b: f64) -> f64 {
        match self {
            Engine::ChaCha8(r) => r.range_f64(a, b),
            Engine::Small(r) => r.range_f64(a, b),
        }
    }
    fn reseed(&mut self, seed: u64) {
        match self {
            Engine::ChaCha8(r) => r.reseed(seed),
            Engine::Small(r) => r.reseed(seed),
        }
    }
}
