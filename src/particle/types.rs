// particle/types.rs
// Particle entity, identity and auxiliary attributes

use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use ultraviolet::DVec3;

use crate::units;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique particle identity, fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(u64);

impl ParticleId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A charged particle.
///
/// Location, velocity, charge and mass are SI. `index` is the stable external
/// index the owning integrator assigns when the particle is added.
#[derive(Clone, Debug)]
pub struct Particle {
    pub id: ParticleId,
    pub index: usize,
    pub location: DVec3,
    pub velocity: DVec3,
    pub charge: f64,
    pub mass: f64,
    pub active: bool,
    /// Raised by acceleration functions when the particle left a valid field region.
    pub invalid: bool,
    pub time_of_birth: f64,
    pub splat_time: Option<f64>,
    float_attributes: SmallVec<[(String, f64); 2]>,
    int_attributes: SmallVec<[(String, i64); 2]>,
}

impl Particle {
    pub fn new(location: DVec3, velocity: DVec3, charge: f64, mass: f64) -> Self {
        Self {
            id: ParticleId::next(),
            index: 0,
            location,
            velocity,
            charge,
            mass,
            active: true,
            invalid: false,
            time_of_birth: 0.0,
            splat_time: None,
            float_attributes: SmallVec::new(),
            int_attributes: SmallVec::new(),
        }
    }

    /// Resting ion from a charge in elementary charges and a mass in amu.
    pub fn ion(location: DVec3, charge_elementary: f64, mass_amu: f64) -> Self {
        Self::new(
            location,
            DVec3::zero(),
            units::elementary_to_coulomb(charge_elementary),
            units::amu_to_kg(mass_amu),
        )
    }

    pub fn with_time_of_birth(mut self, time_of_birth: f64) -> Self {
        self.time_of_birth = time_of_birth;
        self
    }

    pub fn is_born(&self, time: f64) -> bool {
        self.time_of_birth <= time
    }

    /// Terminate the particle at `time` (splat).
    pub fn deactivate(&mut self, time: f64) {
        self.active = false;
        self.splat_time = Some(time);
    }

    /// Bring a terminated particle back at a new start location.
    pub fn restart(&mut self, location: DVec3, velocity: DVec3, time: f64) {
        self.location = location;
        self.velocity = velocity;
        self.active = true;
        self.invalid = false;
        self.splat_time = None;
        self.time_of_birth = time;
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.mag_sq()
    }

    pub fn set_float_attribute(&mut self, key: &str, value: f64) {
        match self.float_attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.float_attributes.push((key.to_owned(), value)),
        }
    }

    pub fn float_attribute(&self, key: &str) -> Option<f64> {
        self.float_attributes.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn set_int_attribute(&mut self, key: &str, value: i64) {
        match self.int_attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.int_attributes.push((key.to_owned(), value)),
        }
    }

    pub fn int_attribute(&self, key: &str) -> Option<i64> {
        self.int_attributes.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn float_attributes(&self) -> impl Iterator<Item = (&str, f64)> {
        self.float_attributes.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn int_attributes(&self) -> impl Iterator<Item = (&str, i64)> {
        self.int_attributes.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
