//! Test RNG — deterministic `DiceRng` implementations for tests.

use std::collections::VecDeque;

use parlor_core::rng::DiceRng;

/// A no-op RNG that always returns `min` for `next_u32_range` and `0.0`
/// for `next_f64`. Suitable for tests that do not depend on specific
/// random values. Note that `0.0` is below every burn probability, so
/// probabilistic reroll burns always happen under this RNG.
#[derive(Debug, Default)]
pub struct MockRng;

impl DiceRng for MockRng {
    fn next_u32_range(&mut self, min: u32, _max: u32) -> u32 {
        min
    }

    fn next_f64(&mut self) -> f64 {
        0.0
    }
}

/// An RNG that returns values from predetermined sequences. Integer draws
/// panic when the sequence is exhausted; float draws fall back to `1.0`
/// (which is above every burn probability, so burns never happen unless
/// scripted).
#[derive(Debug)]
pub struct SequenceRng {
    ints: VecDeque<u32>,
    floats: VecDeque<f64>,
}

impl SequenceRng {
    /// Creates a `SequenceRng` with scripted integer draws only.
    #[must_use]
    pub fn new(ints: Vec<u32>) -> Self {
        Self {
            ints: ints.into(),
            floats: VecDeque::new(),
        }
    }

    /// Creates a `SequenceRng` with scripted integer and float draws.
    #[must_use]
    pub fn with_floats(ints: Vec<u32>, floats: Vec<f64>) -> Self {
        Self {
            ints: ints.into(),
            floats: floats.into(),
        }
    }
}

impl DiceRng for SequenceRng {
    fn next_u32_range(&mut self, _min: u32, _max: u32) -> u32 {
        self.ints
            .pop_front()
            .expect("SequenceRng integer sequence exhausted")
    }

    fn next_f64(&mut self) -> f64 {
        self.floats.pop_front().unwrap_or(1.0)
    }
}
