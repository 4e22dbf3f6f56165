pub mod boundary;
pub mod collision;
pub mod config;
pub mod integration;
pub mod ion_cloud;
pub mod octree;
pub mod particle;
pub mod profiler;
pub mod random;
pub mod space_charge;
pub mod start_zone;
pub mod tracker;
pub mod trajectory;
pub mod units;

#[cfg(feature = "profiling")]
use once_cell::sync::Lazy;
#[cfg(feature = "profiling")]
use parking_lot::Mutex;

#[cfg(feature = "profiling")]
pub static PROFILER: Lazy<Mutex<profiler::Profiler>> =
    Lazy::new(|| Mutex::new(profiler::Profiler::new()));
