//! Random number sources for stochastic collaborators (collision models,
//! start zones).
//!
//! A [`RandomGeneratorPool`] owns one source per rayon worker thread. The
//! calling thread's source is handed out through [`RandomGeneratorPool::thread_source`].
//! Deterministic runs swap in [`FixedSequenceSource`], which replays a fixed
//! list of samples.

mod pool;
mod sources;

pub use pool::{RandomGeneratorPool, SourceGuard};
pub use sources::{FixedSequenceSource, SeededSource};

/// Uniform and normal samples.
pub trait RandomSource: Send {
    /// Uniform sample in `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// Standard normal sample (mean 0, variance 1).
    fn normal(&mut self) -> f64;

    fn uniform_in(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.uniform()
    }
}
