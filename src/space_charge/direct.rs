use rayon::prelude::*;
use ultraviolet::DVec3;

use super::registry::{ParticleRegistry, SlotKey};
use super::{coulomb_sample, is_finite, FieldCalculator, FieldSample, SpaceChargeError};
use crate::particle::Particle;
use crate::profile_scope;

#[derive(Clone, Debug)]
struct DirectEntry {
    location: DVec3,
    charge: f64,
    gradient: DVec3,
    potential: f64,
}

/// Exact pairwise summation behind the same contract as the tree.
///
/// Field and potential for every registered particle are computed once per
/// aggregation pass and cached on the registry entry; queries only read the
/// cache. Cost is O(N^2) per pass, meant for small particle counts and as a
/// reference for the tree.
pub struct DirectSumSolver {
    coulomb_constant: f64,
    e_sq: f64,
    registry: ParticleRegistry<DirectEntry>,
    stale: bool,
}

impl DirectSumSolver {
    pub fn new(coulomb_constant: f64, softening: f64) -> Self {
        Self {
            coulomb_constant,
            e_sq: softening * softening,
            registry: ParticleRegistry::new(),
            stale: false,
        }
    }
}

impl FieldCalculator for DirectSumSolver {
    fn insert_particle(&mut self, particle: &Particle, ext_index: usize) -> Result<(), SpaceChargeError> {
        if !is_finite(particle.location) {
            return Err(SpaceChargeError::NonFiniteLocation { index: ext_index });
        }
        let entry = DirectEntry {
            location: particle.location,
            charge: particle.charge,
            gradient: DVec3::zero(),
            potential: 0.0,
        };
        self.registry.insert(particle.id, ext_index, entry)?;
        self.stale = true;
        Ok(())
    }

    fn remove_particle(&mut self, ext_index: usize) -> Result<(), SpaceChargeError> {
        self.registry.remove(ext_index)?;
        self.stale = true;
        Ok(())
    }

    fn update_particle(&mut self, particle: &Particle, ext_index: usize) -> Result<(), SpaceChargeError> {
        let key = self.registry.key_by_index(ext_index)?;
        if !is_finite(particle.location) {
            return Err(SpaceChargeError::NonFiniteLocation { index: ext_index });
        }
        let entry = &mut self.registry[key];
        if entry.id != particle.id {
            return Err(SpaceChargeError::ParticleMismatch {
                index: ext_index,
                expected: entry.id,
                found: particle.id,
            });
        }
        entry.payload.location = particle.location;
        entry.payload.charge = particle.charge;
        self.stale = true;
        Ok(())
    }

    fn number_of_particles(&self) -> usize {
        self.registry.len()
    }

    fn compute_charge_distribution(&mut self) {
        profile_scope!("charge_aggregation");
        let sources: Vec<(SlotKey, DVec3, f64)> = self
            .registry
            .iter()
            .map(|(key, e)| (key, e.payload.location, e.payload.charge))
            .collect();

        let k = self.coulomb_constant;
        let e_sq = self.e_sq;
        let samples: Vec<FieldSample> = sources
            .par_iter()
            .map(|&(target, location, _)| {
                sources
                    .iter()
                    .filter(|(key, _, _)| *key != target)
                    .fold(FieldSample::default(), |acc, &(_, src, q)| {
                        acc + coulomb_sample(location - src, q, k, e_sq)
                    })
            })
            .collect();

        for (&(key, _, _), sample) in sources.iter().zip(samples) {
            let payload = &mut self.registry[key].payload;
            payload.gradient = sample.field;
            payload.potential = sample.potential;
        }
        self.stale = false;
    }

    fn sample_space_charge(&self, particle: &Particle) -> Result<FieldSample, SpaceChargeError> {
        if self.stale {
            return Err(SpaceChargeError::StaleChargeDistribution);
        }
        let key = self.registry.key_by_particle(particle.id)?;
        let entry = &self.registry[key].payload;
        Ok(FieldSample {
            potential: entry.potential,
            field: entry.gradient,
        })
    }
}
