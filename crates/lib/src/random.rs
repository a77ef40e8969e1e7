//! Randomness used for admission sampling and stock-reply selection.
//!
//! Injected as a trait object so tests can script the draws.

use rand::Rng;

pub trait RandomSource: Send + Sync {
    /// Uniform sample in `[0, 1)`.
    fn sample(&self) -> f64;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn index(&self, len: usize) -> usize;
}

/// Thread-local generator from `rand`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn sample(&self) -> f64 {
        rand::rng().random::<f64>()
    }

    fn index(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Pick one element uniformly. Returns `None` for an empty slice.
pub fn choose<'a, T>(random: &dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(random.index(items.len()))
}
