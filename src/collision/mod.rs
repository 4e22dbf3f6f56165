//! Background gas collision hooks.
//!
//! A [`CollisionModel`] perturbs acceleration, position and velocity during a
//! Verlet step. Every hook runs inside the parallel evaluation phase with
//! exclusive access to one particle and the calling thread's random source.

use ultraviolet::DVec3;

use crate::particle::Particle;
use crate::random::RandomSource;

pub trait CollisionModel: Send + Sync {
    /// Called once when a particle enters the simulation.
    fn initialize_particle_parameters(&self, _particle: &mut Particle) {}

    /// Called when a particle changed state (e.g. a reaction changed its mass or charge).
    fn update_particle_parameters(&self, _particle: &mut Particle) {}

    fn modify_acceleration(&self, _acceleration: &mut DVec3, _particle: &Particle, _dt: f64) {}

    fn modify_velocity(&self, _particle: &mut Particle, _dt: f64, _rng: &mut dyn RandomSource) {}

    fn modify_position(
        &self,
        _position: &mut DVec3,
        _particle: &Particle,
        _dt: f64,
        _rng: &mut dyn RandomSource,
    ) {
    }
}

/// Applies several models in order.
#[derive(Default)]
pub struct MultiCollisionModel {
    models: Vec<Box<dyn CollisionModel>>,
}

impl MultiCollisionModel {
    pub fn new(models: Vec<Box<dyn CollisionModel>>) -> Self {
        Self { models }
    }

    pub fn push(&mut self, model: Box<dyn CollisionModel>) {
        self.models.push(model);
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl CollisionModel for MultiCollisionModel {
    fn initialize_particle_parameters(&self, particle: &mut Particle) {
        for m in &self.models {
            m.initialize_particle_parameters(particle);
        }
    }

    fn update_particle_parameters(&self, particle: &mut Particle) {
        for m in &self.models {
            m.update_particle_parameters(particle);
        }
    }

    fn modify_acceleration(&self, acceleration: &mut DVec3, particle: &Particle, dt: f64) {
        for m in &self.models {
            m.modify_acceleration(acceleration, particle, dt);
        }
    }

    fn modify_velocity(&self, particle: &mut Particle, dt: f64, rng: &mut dyn RandomSource) {
        for m in &self.models {
            m.modify_velocity(particle, dt, rng);
        }
    }

    fn modify_position(&self, position: &mut DVec3, particle: &Particle, dt: f64, rng: &mut dyn RandomSource) {
        for m in &self.models {
            m.modify_position(position, particle, dt, rng);
        }
    }
}

#[cfg(test)]
mod tests;
