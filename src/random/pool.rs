use crossbeam::utils::CachePadded;
use parking_lot::{Mutex, MutexGuard};

use super::sources::{FixedSequenceSource, SeededSource};
use super::RandomSource;

pub type SourceGuard<'a> = MutexGuard<'a, Box<dyn RandomSource>>;

/// One random source per worker thread plus one for callers outside the pool.
///
/// Slot 0 serves threads that are not rayon workers; worker `i` uses slot
/// `i + 1`. Each worker only ever touches its own slot, so worker locks are
/// never contended. The lock is there for slot 0, which every non-worker
/// caller (the main thread, threads of another rayon pool) shares.
pub struct RandomGeneratorPool {
    sources: Vec<CachePadded<Mutex<Box<dyn RandomSource>>>>,
}

impl RandomGeneratorPool {
    /// Sources seeded from the operating system.
    pub fn new() -> Self {
        Self::build(|_| Box::new(SeededSource::from_os()))
    }

    /// Sources seeded from `seed`, one derived seed per slot.
    pub fn seeded(seed: u64) -> Self {
        Self::build(|slot| Box::new(SeededSource::from_seed(seed.wrapping_add(slot as u64))))
    }

    /// Every slot replays the same fixed sequence.
    pub fn deterministic() -> Self {
        Self::build(|_| Box::new(FixedSequenceSource::new()))
    }

    fn build(mut make: impl FnMut(usize) -> Box<dyn RandomSource>) -> Self {
        let slots = rayon::current_num_threads() + 1;
        Self {
            sources: (0..slots).map(|slot| CachePadded::new(Mutex::new(make(slot)))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Re-seed every slot deterministically.
    pub fn set_seed(&mut self, seed: u64) {
        for (slot, source) in self.sources.iter_mut().enumerate() {
            *source.get_mut() = Box::new(SeededSource::from_seed(seed.wrapping_add(slot as u64)));
        }
    }

    /// The source bound to the calling thread.
    pub fn thread_source(&self) -> SourceGuard<'_> {
        let slot = rayon::current_thread_index().map_or(0, |i| i + 1) % self.sources.len();
        self.sources[slot].lock()
    }
}

impl Default for RandomGeneratorPool {
    fn default() -> Self {
        Self::new()
    }
}
