//! Space-charge field evaluation.
//!
//! [`FieldCalculator`] is the contract every solver implements. A calculator
//! is used in three strictly ordered phases per timestep:
//!
//! 1. mutation: [`FieldCalculator::insert_particle`], [`FieldCalculator::remove_particle`],
//!    [`FieldCalculator::update_particle`] (`&mut self`)
//! 2. aggregation: [`FieldCalculator::compute_charge_distribution`] (`&mut self`)
//! 3. evaluation: [`FieldCalculator::sample_space_charge`] (`&self`, shared across threads)
//!
//! The receiver types make the phases exclusive: nothing can mutate the
//! calculator while evaluation borrows it.

pub mod registry;
mod direct;

pub use direct::DirectSumSolver;
pub use registry::{ParticleRegistry, RegistryEntry, SlotKey};

use std::fmt;
use std::ops::{Add, AddAssign};
use ultraviolet::DVec3;

use crate::config::{self, SolverKind, SpaceChargeConfig};
use crate::octree::{Cube, SpatialChargeTree, TreeParams};
use crate::particle::{Particle, ParticleId};

/// Electric potential (V) and field (V/m) at a point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FieldSample {
    pub potential: f64,
    pub field: DVec3,
}

impl Add for FieldSample {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            potential: self.potential + rhs.potential,
            field: self.field + rhs.field,
        }
    }
}

impl AddAssign for FieldSample {
    fn add_assign(&mut self, rhs: Self) {
        self.potential += rhs.potential;
        self.field += rhs.field;
    }
}

/// Contract violations reported by field calculators.
#[derive(Clone, Debug, PartialEq)]
pub enum SpaceChargeError {
    DuplicateIndex(usize),
    DuplicateParticle(ParticleId),
    UnknownIndex(usize),
    UnknownParticle(ParticleId),
    /// Force query after a mutation without a fresh aggregation pass.
    StaleChargeDistribution,
    NonFiniteLocation { index: usize },
    /// `update_particle` was handed a different particle than the one registered under `index`.
    ParticleMismatch {
        index: usize,
        expected: ParticleId,
        found: ParticleId,
    },
}

impl fmt::Display for SpaceChargeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateIndex(i) => write!(f, "external index {i} is already registered"),
            Self::DuplicateParticle(id) => write!(f, "particle {id} is already registered"),
            Self::UnknownIndex(i) => write!(f, "no particle registered under external index {i}"),
            Self::UnknownParticle(id) => write!(f, "particle {id} is not registered"),
            Self::StaleChargeDistribution => {
                write!(f, "charge distribution queried before it was recomputed")
            }
            Self::NonFiniteLocation { index } => {
                write!(f, "particle at external index {index} has a non-finite location")
            }
            Self::ParticleMismatch { index, expected, found } => write!(
                f,
                "external index {index} belongs to particle {expected}, got {found}"
            ),
        }
    }
}

impl std::error::Error for SpaceChargeError {}

pub trait FieldCalculator: Send + Sync {
    /// Register `particle` under `ext_index`. Aggregates are stale afterwards.
    fn insert_particle(&mut self, particle: &Particle, ext_index: usize) -> Result<(), SpaceChargeError>;

    /// Deregister the particle under `ext_index`. Removing twice is an error.
    fn remove_particle(&mut self, ext_index: usize) -> Result<(), SpaceChargeError>;

    /// Move the registered particle under `ext_index` to the state of `particle`.
    fn update_particle(&mut self, particle: &Particle, ext_index: usize) -> Result<(), SpaceChargeError>;

    fn number_of_particles(&self) -> usize;

    /// Recompute aggregate charges and centroids from the current particle set.
    fn compute_charge_distribution(&mut self);

    /// Field and potential at `particle` due to every other registered particle.
    fn sample_space_charge(&self, particle: &Particle) -> Result<FieldSample, SpaceChargeError>;

    fn e_field_from_space_charge(&self, particle: &Particle) -> Result<DVec3, SpaceChargeError> {
        self.sample_space_charge(particle).map(|s| s.field)
    }
}

/// Build the solver selected in the configuration.
pub fn from_config(settings: &SpaceChargeConfig) -> Box<dyn FieldCalculator> {
    let coulomb_constant = settings.coulomb_constant;
    match settings.solver {
        SolverKind::BarnesHut => {
            let params = TreeParams {
                theta: settings.theta,
                leaf_capacity: settings.leaf_capacity,
                max_depth: settings.max_depth,
                softening: settings.softening_m,
                coulomb_constant,
            };
            let domain = Cube::new_containing(
                config::to_dvec3(settings.domain_min_m),
                config::to_dvec3(settings.domain_max_m),
            );
            Box::new(SpatialChargeTree::new(domain, params))
        }
        SolverKind::Direct => Box::new(DirectSumSolver::new(coulomb_constant, settings.softening_m)),
    }
}

/// Potential and field at offset `d` (target minus source) from a point charge `q`.
///
/// Zero separation contributes nothing.
#[inline]
pub(crate) fn coulomb_sample(d: DVec3, q: f64, k: f64, e_sq: f64) -> FieldSample {
    let r_sq = d.mag_sq();
    if r_sq == 0.0 {
        return FieldSample::default();
    }
    let r_soft_sq = r_sq + e_sq;
    let inv_r = r_soft_sq.sqrt().recip();
    let kq = k * q;
    FieldSample {
        potential: kq * inv_r,
        field: d * (kq * inv_r * inv_r * inv_r),
    }
}

#[inline]
pub(crate) fn is_finite(v: DVec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

#[cfg(test)]
mod tests;
