use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use super::RandomSource;

/// `StdRng` backed source.
pub struct SeededSource {
    rng: StdRng,
}

impl SeededSource {
    pub fn from_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_os() -> Self {
        Self { rng: StdRng::from_os_rng() }
    }
}

impl RandomSource for SeededSource {
    fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }
}

const UNIFORM_SAMPLES: [f64; 10] = [0.5, 0.1, 0.9, 0.3, 0.7, 0.2, 0.8, 0.4, 0.6, 0.0];
const NORMAL_SAMPLES: [f64; 8] = [0.0, 1.0, -1.0, 0.5, -0.5, 2.0, -2.0, 0.25];

/// Cycles through fixed sample lists. Not random at all.
#[derive(Default)]
pub struct FixedSequenceSource {
    uniform_at: usize,
    normal_at: usize,
}

impl FixedSequenceSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RandomSource for FixedSequenceSource {
    fn uniform(&mut self) -> f64 {
        let v = UNIFORM_SAMPLES[self.uniform_at];
        self.uniform_at = (self.uniform_at + 1) % UNIFORM_SAMPLES.len();
        v
    }

    fn normal(&mut self) -> f64 {
        let v = NORMAL_SAMPLES[self.normal_at];
        self.normal_at = (self.normal_at + 1) % NORMAL_SAMPLES.len();
        v
    }
}
