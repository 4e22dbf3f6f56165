//! Regions that new particles are started in.

use ultraviolet::DVec3;

use crate::config::{to_dvec3, ParticleGroupConfig, StartZoneConfig};
use crate::particle::Particle;
use crate::random::{RandomGeneratorPool, RandomSource};

pub trait StartZone: Send + Sync {
    fn random_location(&self, rng: &mut dyn RandomSource) -> DVec3;

    fn contains(&self, location: DVec3) -> bool;
}

/// Axis-aligned box given by center and edge lengths.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxStartZone {
    pub center: DVec3,
    pub size: DVec3,
}

impl BoxStartZone {
    pub fn new(center: DVec3, size: DVec3) -> Self {
        Self { center, size }
    }
}

impl StartZone for BoxStartZone {
    fn random_location(&self, rng: &mut dyn RandomSource) -> DVec3 {
        let half = self.size * 0.5;
        DVec3::new(
            rng.uniform_in(self.center.x - half.x, self.center.x + half.x),
            rng.uniform_in(self.center.y - half.y, self.center.y + half.y),
            rng.uniform_in(self.center.z - half.z, self.center.z + half.z),
        )
    }

    fn contains(&self, location: DVec3) -> bool {
        let d = location - self.center;
        let half = self.size * 0.5;
        d.x.abs() <= half.x && d.y.abs() <= half.y && d.z.abs() <= half.z
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereStartZone {
    pub center: DVec3,
    pub radius: f64,
}

impl SphereStartZone {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }
}

impl StartZone for SphereStartZone {
    // rejection sampling from the enclosing cube
    fn random_location(&self, rng: &mut dyn RandomSource) -> DVec3 {
        loop {
            let p = DVec3::new(
                rng.uniform_in(-1.0, 1.0),
                rng.uniform_in(-1.0, 1.0),
                rng.uniform_in(-1.0, 1.0),
            );
            if p.mag_sq() <= 1.0 {
                return self.center + p * self.radius;
            }
        }
    }

    fn contains(&self, location: DVec3) -> bool {
        (location - self.center).mag_sq() <= self.radius * self.radius
    }
}

pub fn from_config(zone: &StartZoneConfig) -> Box<dyn StartZone> {
    match zone {
        StartZoneConfig::Box { center_m, size_m } => {
            Box::new(BoxStartZone::new(to_dvec3(*center_m), to_dvec3(*size_m)))
        }
        StartZoneConfig::Sphere { center_m, radius_m } => {
            Box::new(SphereStartZone::new(to_dvec3(*center_m), *radius_m))
        }
    }
}

/// Integer attribute holding the index of the group a particle was spawned from.
pub const GROUP_ATTRIBUTE: &str = "group";

/// Resting ions of one group, born evenly over the group's birth interval.
pub fn spawn_group(group: &ParticleGroupConfig, pool: &RandomGeneratorPool) -> Vec<Particle> {
    let zone = from_config(&group.start_zone);
    let mut rng = pool.thread_source();
    let step = if group.count > 0 {
        group.birth_interval_s / group.count as f64
    } else {
        0.0
    };
    (0..group.count)
        .map(|i| {
            let location = zone.random_location(&mut **rng);
            Particle::ion(location, group.charge_elementary, group.mass_amu)
                .with_time_of_birth(i as f64 * step)
        })
        .collect()
}

/// Every group in order, each particle tagged with [`GROUP_ATTRIBUTE`].
pub fn spawn_groups(groups: &[ParticleGroupConfig], pool: &RandomGeneratorPool) -> Vec<Particle> {
    groups
        .iter()
        .enumerate()
        .flat_map(|(g, group)| {
            let mut particles = spawn_group(group, pool);
            for p in &mut particles {
                p.set_int_attribute(GROUP_ATTRIBUTE, g as i64);
            }
            particles
        })
        .collect()
}
