//! Start and splat bookkeeping per particle.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use ultraviolet::DVec3;

use crate::particle::{Particle, ParticleId};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackRecord {
    pub index: usize,
    pub start_time: f64,
    pub start_location: [f64; 3],
    pub splat_time: Option<f64>,
    pub splat_location: Option<[f64; 3]>,
    pub restarts: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackerSummary {
    pub started: usize,
    pub splatted: usize,
    pub restarted: usize,
}

/// Records where and when particles started and ended.
///
/// Shared between the start-monitoring and other-actions hooks; the
/// other-actions hook runs on worker threads, hence the lock.
#[derive(Default)]
pub struct ParticleStartSplatTracker {
    records: Mutex<HashMap<ParticleId, TrackRecord>>,
}

fn to_array(v: DVec3) -> [f64; 3] {
    [v.x, v.y, v.z]
}

impl ParticleStartSplatTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn particle_start(&self, particle: &Particle, time: f64) {
        self.records.lock().insert(
            particle.id,
            TrackRecord {
                index: particle.index,
                start_time: time,
                start_location: to_array(particle.location),
                splat_time: None,
                splat_location: None,
                restarts: 0,
            },
        );
    }

    /// Record a splat at `location`. Unknown particles are ignored.
    pub fn particle_splat(&self, particle: &Particle, location: DVec3, time: f64) {
        if let Some(record) = self.records.lock().get_mut(&particle.id) {
            record.splat_time = Some(time);
            record.splat_location = Some(to_array(location));
        }
    }

    /// A splatted particle was put back at its start zone.
    pub fn particle_restart(&self, particle: &Particle, time: f64) {
        if let Some(record) = self.records.lock().get_mut(&particle.id) {
            record.restarts += 1;
            record.start_time = time;
            record.start_location = to_array(particle.location);
            record.splat_time = None;
            record.splat_location = None;
        }
    }

    pub fn record(&self, id: ParticleId) -> Option<TrackRecord> {
        self.records.lock().get(&id).cloned()
    }

    /// All records ordered by external index.
    pub fn records(&self) -> Vec<TrackRecord> {
        let mut v: Vec<_> = self.records.lock().values().cloned().collect();
        v.sort_by_key(|r| r.index);
        v
    }

    pub fn summary(&self) -> TrackerSummary {
        let records = self.records.lock();
        TrackerSummary {
            started: records.len(),
            splatted: records.values().filter(|r| r.splat_time.is_some()).count(),
            restarted: records.values().map(|r| r.restarts).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_splat() {
        let tracker = ParticleStartSplatTracker::new();
        let mut p = Particle::new(DVec3::new(1.0, 0.0, 0.0), DVec3::zero(), 1.0, 1.0);
        p.index = 4;
        tracker.particle_start(&p, 0.5);
        tracker.particle_splat(&p, DVec3::new(2.0, 0.0, 0.0), 1.5);

        let r = tracker.record(p.id).unwrap();
        assert_eq!(r.index, 4);
        assert_eq!(r.start_location, [1.0, 0.0, 0.0]);
        assert_eq!(r.splat_time, Some(1.5));
        assert_eq!(r.splat_location, Some([2.0, 0.0, 0.0]));
        assert_eq!(
            tracker.summary(),
            TrackerSummary { started: 1, splatted: 1, restarted: 0 }
        );
    }

    #[test]
    fn restart_clears_splat() {
        let tracker = ParticleStartSplatTracker::new();
        let p = Particle::new(DVec3::zero(), DVec3::zero(), 1.0, 1.0);
        tracker.particle_start(&p, 0.0);
        tracker.particle_splat(&p, DVec3::zero(), 1.0);
        tracker.particle_restart(&p, 1.0);
        let r = tracker.record(p.id).unwrap();
        assert_eq!(r.restarts, 1);
        assert!(r.splat_time.is_none());
        assert_eq!(tracker.summary().splatted, 0);
    }

    #[test]
    fn unknown_particles_are_ignored() {
        let tracker = ParticleStartSplatTracker::new();
        let p = Particle::new(DVec3::zero(), DVec3::zero(), 1.0, 1.0);
        tracker.particle_splat(&p, DVec3::zero(), 1.0);
        assert!(tracker.records().is_empty());
    }
}
