//! Simulation boundary: where the external field is defined and what happens
//! to particles that leave it.

use std::sync::Arc;
use ultraviolet::DVec3;

use crate::config::{BoundaryConfig, SimulationConfig};
use crate::particle::Particle;
use crate::random::RandomGeneratorPool;
use crate::start_zone::{self, StartZone, GROUP_ATTRIBUTE};
use crate::tracker::ParticleStartSplatTracker;

pub struct BoundaryActions {
    bounds: BoundaryConfig,
    /// Start zone per particle group; `None` terminates leaving particles.
    restart_zones: Option<Vec<Box<dyn StartZone>>>,
    tracker: Arc<ParticleStartSplatTracker>,
    random: Arc<RandomGeneratorPool>,
}

impl BoundaryActions {
    pub fn new(
        bounds: BoundaryConfig,
        restart_zones: Option<Vec<Box<dyn StartZone>>>,
        tracker: Arc<ParticleStartSplatTracker>,
        random: Arc<RandomGeneratorPool>,
    ) -> Self {
        Self { bounds, restart_zones, tracker, random }
    }

    /// `None` when the configuration has no boundary.
    pub fn from_config(
        cfg: &SimulationConfig,
        tracker: Arc<ParticleStartSplatTracker>,
        random: Arc<RandomGeneratorPool>,
    ) -> Option<Self> {
        let bounds = cfg.boundary.clone()?;
        let restart_zones = bounds
            .restart
            .then(|| cfg.groups.iter().map(|g| start_zone::from_config(&g.start_zone)).collect());
        Some(Self::new(bounds, restart_zones, tracker, random))
    }

    /// Whether the external field is defined at the particle. Marks the
    /// particle invalid when it is not.
    pub fn check_field_domain(&self, p: &mut Particle) -> bool {
        if self.bounds.contains(p.location) {
            true
        } else {
            p.invalid = true;
            false
        }
    }

    fn restart_zone(&self, p: &Particle) -> Option<&dyn StartZone> {
        let zones = self.restart_zones.as_ref()?;
        let group = usize::try_from(p.int_attribute(GROUP_ATTRIBUTE)?).ok()?;
        zones.get(group).map(|z| &**z)
    }

    /// Splat particles that are invalid or whose candidate location `next`
    /// is outside the boundary. Restartable particles are put back into their
    /// group's start zone at rest, all others are terminated.
    pub fn apply(&self, next: &mut DVec3, p: &mut Particle, time: f64) {
        if !p.invalid && self.bounds.contains(*next) {
            return;
        }
        self.tracker.particle_splat(p, *next, time);
        match self.restart_zone(p) {
            Some(zone) => {
                let location = zone.random_location(&mut **self.random.thread_source());
                p.restart(location, DVec3::zero(), time);
                *next = location;
                self.tracker.particle_restart(p, time);
            }
            None => p.deactivate(time),
        }
    }
}
