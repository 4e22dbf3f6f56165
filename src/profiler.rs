use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cumulative wall-clock time and hit count per named section.
#[derive(Default)]
pub struct Profiler {
    pub timings: HashMap<&'static str, (Duration, u64)>,
}

impl Profiler {
    pub fn new() -> Self {
        Self { timings: HashMap::new() }
    }

    pub fn finish(&mut self, guard: &ProfilerGuard) {
        let elapsed = guard.start.elapsed();
        let entry = self.timings.entry(guard.name).or_default();
        entry.0 += elapsed;
        entry.1 += 1;
    }

    /// Sections ordered by total time, longest first.
    pub fn report_sorted(&self) -> Vec<(&'static str, Duration, u64)> {
        let mut v: Vec<_> = self
            .timings
            .iter()
            .map(|(n, (d, hits))| (*n, *d, *hits))
            .collect();
        v.sort_by(|a, b| b.1.cmp(&a.1));
        v
    }

    pub fn clear(&mut self) {
        self.timings.clear();
    }

    pub fn log_and_clear(&mut self) {
        for (name, total, hits) in self.report_sorted() {
            let mean = if hits > 0 { total / hits as u32 } else { Duration::ZERO };
            tracing::info!("{:<20} total {:?} over {} calls (mean {:?})", name, total, hits, mean);
        }
        self.clear();
    }
}

pub struct ProfilerGuard {
    name: &'static str,
    start: Instant,
}

/// Start a profiling section. The returned guard reports into the global
/// profiler when dropped.
pub fn start(name: &'static str) -> ProfilerGuard {
    ProfilerGuard { name, start: Instant::now() }
}

#[cfg(feature = "profiling")]
impl Drop for ProfilerGuard {
    fn drop(&mut self) {
        crate::PROFILER.lock().finish(self);
    }
}

/// Profile the enclosing scope when the `profiling` feature is enabled.
#[macro_export]
macro_rules! profile_scope {
    ($name:expr) => {
        #[cfg(feature = "profiling")]
        let _guard = $crate::profiler::start($name);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_is_sorted_by_total_time() {
        let mut profiler = Profiler::new();
        profiler.timings.insert("short", (Duration::from_millis(1), 1));
        profiler.timings.insert("long", (Duration::from_millis(9), 3));
        let report = profiler.report_sorted();
        assert_eq!(report[0].0, "long");
        assert_eq!(report[0].2, 3);
        assert_eq!(report[1].0, "short");
    }

    #[test]
    fn finishing_a_guard_accumulates() {
        let mut profiler = Profiler::new();
        let guard = start("section");
        profiler.finish(&guard);
        profiler.finish(&guard);
        assert_eq!(profiler.timings["section"].1, 2);
    }
}
