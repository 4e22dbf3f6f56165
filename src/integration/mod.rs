//! Trajectory integration.
//!
//! [`ParallelVerletIntegrator`] advances a particle arena with velocity-Verlet
//! steps. Application behaviour is injected as closures:
//!
//! | hook | signature |
//! |---|---|
//! | acceleration | `(particle, index, field calculator, time, timestep) -> acceleration` |
//! | timestep write | `(particles, time, timestep, is_last)` |
//! | other actions | `(candidate position, particle, index, time, timestep)` |
//! | start monitoring | `(particle, time)` |
//!
//! The other-actions hook moves a particle by changing the candidate position.
//! If it sets `particle.location` itself, e.g. through [`Particle::restart`],
//! that location is kept and the particle starts over without a velocity kick.

mod verlet;

pub use verlet::{ParallelVerletIntegrator, VerletBuilder};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ultraviolet::DVec3;

use crate::particle::Particle;
use crate::space_charge::{FieldCalculator, SpaceChargeError};

pub type AccelerationFn = Box<
    dyn Fn(&mut Particle, usize, &dyn FieldCalculator, f64, usize) -> Result<DVec3, SpaceChargeError>
        + Send
        + Sync,
>;
pub type TimestepWriteFn = Box<dyn FnMut(&[Particle], f64, usize, bool) + Send>;
pub type OtherActionsFn = Box<dyn Fn(&mut DVec3, &mut Particle, usize, f64, usize) + Send + Sync>;
pub type StartMonitoringFn = Box<dyn FnMut(&Particle, f64) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    /// The current step completes, then the run is finalized.
    InTermination,
    Terminated,
}

/// Cloneable flag an outside party raises to stop a run. Polled once per step.
#[derive(Clone, Debug, Default)]
pub struct TerminationHandle(Arc<AtomicBool>);

impl TerminationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Callback that requests termination, for use as a signal handler.
    pub fn signal_receiver(self) -> impl FnMut() + Send + 'static {
        move || {
            tracing::warn!("termination signal received, stopping after the current step");
            self.request();
        }
    }
}

/// Request termination through `handle` on SIGINT or SIGTERM.
/// Only one handler can be installed per process.
pub fn terminate_on_signal(handle: TerminationHandle) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(handle.signal_receiver())
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntegratorError {
    SpaceCharge(SpaceChargeError),
    AlreadyTerminated,
    /// The field calculator's count disagrees with the integrator's own.
    ParticleCountMismatch { registered: usize, expected: usize },
}

impl fmt::Display for IntegratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpaceCharge(e) => write!(f, "space charge bookkeeping failed: {e}"),
            Self::AlreadyTerminated => write!(f, "integrator has already terminated"),
            Self::ParticleCountMismatch { registered, expected } => write!(
                f,
                "field calculator holds {registered} particles, integrator expects {expected}"
            ),
        }
    }
}

impl std::error::Error for IntegratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SpaceCharge(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SpaceChargeError> for IntegratorError {
    fn from(e: SpaceChargeError) -> Self {
        Self::SpaceCharge(e)
    }
}
