use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};
use ultraviolet::DVec3;

use super::{
    AccelerationFn, IntegratorError, OtherActionsFn, RunState, StartMonitoringFn, TerminationHandle,
    TimestepWriteFn,
};
use crate::collision::CollisionModel;
use crate::particle::Particle;
use crate::profile_scope;
use crate::random::RandomGeneratorPool;
use crate::space_charge::{FieldCalculator, SpaceChargeError};

/// Integrator-side state per particle, parallel to the particle arena.
#[derive(Clone, Copy, Debug, Default)]
struct ParticleSlot {
    born: bool,
    registered: bool,
    /// Acceleration at the particle's current location, valid when `has_a_t`.
    a_t: DVec3,
    has_a_t: bool,
    /// The other-actions hook put the particle somewhere else (restart).
    relocated: bool,
}

/// Velocity-Verlet integrator driving a [`FieldCalculator`].
///
/// Each step runs in strictly separated phases:
///
/// 1. parallel: tentative position from the stored `a(t)`, collision and
///    other-actions hooks
/// 2. serial: deactivated particles leave the field calculator, the rest are
///    moved, particles born by `t + dt` are registered
/// 3. charges aggregated
/// 4. parallel: `a(t + dt)` and the velocity update; `a(t + dt)` is kept as the
///    next step's `a(t)`
///
/// Phase 4 sees the field calculator only through a shared reference. The
/// charge distribution is aggregated and every particle queried once per step;
/// only the first step (or one after [`ParallelVerletIntegrator::add_particle`])
/// needs an extra pass to get the initial `a(t)`.
pub struct ParallelVerletIntegrator {
    particles: Vec<Particle>,
    slots: Vec<ParticleSlot>,
    field: Box<dyn FieldCalculator>,
    acceleration: AccelerationFn,
    timestep_write: Option<TimestepWriteFn>,
    other_actions: Option<OtherActionsFn>,
    start_monitoring: Option<StartMonitoringFn>,
    collision: Option<Box<dyn CollisionModel>>,
    random: Arc<RandomGeneratorPool>,
    termination: TerminationHandle,
    state: RunState,
    time: f64,
    timestep: usize,
    registered: usize,
    started: bool,
}

pub struct VerletBuilder {
    particles: Vec<Particle>,
    field: Box<dyn FieldCalculator>,
    acceleration: AccelerationFn,
    timestep_write: Option<TimestepWriteFn>,
    other_actions: Option<OtherActionsFn>,
    start_monitoring: Option<StartMonitoringFn>,
    collision: Option<Box<dyn CollisionModel>>,
    random: Option<Arc<RandomGeneratorPool>>,
    termination: Option<TerminationHandle>,
}

impl VerletBuilder {
    /// Start from an existing particle set instead of an empty one.
    pub fn particles(mut self, particles: Vec<Particle>) -> Self {
        self.particles = particles;
        self
    }

    pub fn timestep_write(mut self, f: impl FnMut(&[Particle], f64, usize, bool) + Send + 'static) -> Self {
        self.timestep_write = Some(Box::new(f));
        self
    }

    pub fn other_actions(
        mut self,
        f: impl Fn(&mut DVec3, &mut Particle, usize, f64, usize) + Send + Sync + 'static,
    ) -> Self {
        self.other_actions = Some(Box::new(f));
        self
    }

    pub fn start_monitoring(mut self, f: impl FnMut(&Particle, f64) + Send + 'static) -> Self {
        self.start_monitoring = Some(Box::new(f));
        self
    }

    pub fn collision_model(mut self, model: Box<dyn CollisionModel>) -> Self {
        self.collision = Some(model);
        self
    }

    pub fn random_pool(mut self, pool: Arc<RandomGeneratorPool>) -> Self {
        self.random = Some(pool);
        self
    }

    pub fn termination_handle(mut self, handle: TerminationHandle) -> Self {
        self.termination = Some(handle);
        self
    }

    /// Fails when the field calculator already holds particles the integrator does not know of.
    pub fn build(self) -> Result<ParallelVerletIntegrator, IntegratorError> {
        let held = self.field.number_of_particles();
        if held != 0 {
            return Err(IntegratorError::ParticleCountMismatch { registered: held, expected: 0 });
        }

        let mut particles = self.particles;
        for (i, p) in particles.iter_mut().enumerate() {
            p.index = i;
        }
        let slots = vec![ParticleSlot::default(); particles.len()];

        Ok(ParallelVerletIntegrator {
            particles,
            slots,
            field: self.field,
            acceleration: self.acceleration,
            timestep_write: self.timestep_write,
            other_actions: self.other_actions,
            start_monitoring: self.start_monitoring,
            collision: self.collision,
            random: self.random.unwrap_or_else(|| Arc::new(RandomGeneratorPool::new())),
            termination: self.termination.unwrap_or_default(),
            state: RunState::Idle,
            time: 0.0,
            timestep: 0,
            registered: 0,
            started: false,
        })
    }
}

impl ParallelVerletIntegrator {
    pub fn builder(
        field: Box<dyn FieldCalculator>,
        acceleration: impl Fn(&mut Particle, usize, &dyn FieldCalculator, f64, usize) -> Result<DVec3, SpaceChargeError>
            + Send
            + Sync
            + 'static,
    ) -> VerletBuilder {
        VerletBuilder {
            particles: Vec::new(),
            field,
            acceleration: Box::new(acceleration),
            timestep_write: None,
            other_actions: None,
            start_monitoring: None,
            collision: None,
            random: None,
            termination: None,
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn into_particles(self) -> Vec<Particle> {
        self.particles
    }

    pub fn field_calculator(&self) -> &dyn FieldCalculator {
        &*self.field
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn timestep(&self) -> usize {
        self.timestep
    }

    pub fn termination_handle(&self) -> TerminationHandle {
        self.termination.clone()
    }

    pub fn random_pool(&self) -> &Arc<RandomGeneratorPool> {
        &self.random
    }

    /// Particles currently registered with the field calculator.
    pub fn registered_particles(&self) -> usize {
        self.registered
    }

    /// Append a particle. It is registered with the field calculator right
    /// away when it is already born, otherwise at the end of the first step
    /// that reaches its time of birth.
    pub fn add_particle(&mut self, mut particle: Particle) -> Result<usize, IntegratorError> {
        if self.state == RunState::Terminated {
            return Err(IntegratorError::AlreadyTerminated);
        }
        let index = self.particles.len();
        particle.index = index;
        self.particles.push(particle);
        self.slots.push(ParticleSlot::default());
        self.bear(index, self.time)?;
        Ok(index)
    }

    fn bear(&mut self, i: usize, time: f64) -> Result<(), IntegratorError> {
        let (p, slot) = (&mut self.particles[i], &mut self.slots[i]);
        if slot.born || !p.active || !p.is_born(time) {
            return Ok(());
        }
        if let Some(model) = &self.collision {
            model.initialize_particle_parameters(p);
        }
        self.field.insert_particle(p, i)?;
        slot.born = true;
        slot.registered = true;
        slot.has_a_t = false;
        self.registered += 1;
        if let Some(monitor) = self.start_monitoring.as_mut() {
            monitor(&*p, time);
        }
        Ok(())
    }

    fn bear_particles(&mut self, time: f64) -> Result<(), IntegratorError> {
        for i in 0..self.particles.len() {
            self.bear(i, time)?;
        }
        Ok(())
    }

    fn all_particles_inactive(&self) -> bool {
        !self.particles.is_empty() && self.particles.iter().all(|p| !p.active)
    }

    fn check_bookkeeping(&self) -> Result<(), IntegratorError> {
        let held = self.field.number_of_particles();
        if held != self.registered {
            return Err(IntegratorError::ParticleCountMismatch {
                registered: held,
                expected: self.registered,
            });
        }
        Ok(())
    }

    /// Aggregate and evaluate `a(t)` for registered particles that have none
    /// yet. Does nothing in a running simulation, where `a(t)` is carried over.
    fn prime_accelerations(&mut self, dt: f64) -> Result<(), IntegratorError> {
        if self.slots.iter().all(|s| !s.registered || s.has_a_t) {
            return Ok(());
        }
        self.field.compute_charge_distribution();

        let field: &dyn FieldCalculator = &*self.field;
        let acceleration = &self.acceleration;
        let collision = self.collision.as_deref();
        let (time, timestep) = (self.time, self.timestep);

        self.particles
            .par_iter_mut()
            .zip(self.slots.par_iter_mut())
            .enumerate()
            .try_for_each(|(i, (p, slot))| -> Result<(), IntegratorError> {
                if !slot.registered || slot.has_a_t {
                    return Ok(());
                }
                let mut a = acceleration(&mut *p, i, field, time, timestep)?;
                if let Some(model) = collision {
                    model.modify_acceleration(&mut a, p, dt);
                }
                slot.a_t = a;
                slot.has_a_t = true;
                Ok(())
            })
    }

    /// Parallel: tentative position from `a(t)`, then the per-particle hooks.
    /// No field query happens here.
    fn advance_positions(&mut self, dt: f64) {
        profile_scope!("verlet_phase_a");
        let other_actions = self.other_actions.as_ref();
        let collision = self.collision.as_deref();
        let random: &RandomGeneratorPool = &self.random;
        let (time, timestep) = (self.time, self.timestep);

        self.particles
            .par_iter_mut()
            .zip(self.slots.par_iter_mut())
            .enumerate()
            .for_each(|(i, (p, slot))| {
                if !slot.registered {
                    return;
                }
                let mut next = p.location + p.velocity * dt + slot.a_t * (0.5 * dt * dt);
                if let Some(model) = collision {
                    let mut rng = random.thread_source();
                    model.modify_position(&mut next, p, dt, &mut **rng);
                }
                let before = p.location;
                if let Some(actions) = other_actions {
                    actions(&mut next, &mut *p, i, time, timestep);
                }
                // a location set by the hook itself wins over the candidate
                slot.relocated = p.location != before;
                if !slot.relocated {
                    p.location = next;
                }
            })
    }

    /// Serial: mirror the moved particles into the field calculator.
    fn sync_field_calculator(&mut self) -> Result<(), IntegratorError> {
        profile_scope!("registry_sync");
        for (i, (p, slot)) in self.particles.iter().zip(self.slots.iter_mut()).enumerate() {
            if !slot.registered {
                continue;
            }
            if p.active {
                self.field.update_particle(p, i)?;
            } else {
                self.field.remove_particle(i)?;
                slot.registered = false;
                self.registered -= 1;
                debug!(index = i, splat_time = ?p.splat_time, "particle left the simulation");
            }
        }
        self.check_bookkeeping()
    }

    /// Parallel: `a(t + dt)` and the velocity update. Particles born this step
    /// and relocated ones only get their acceleration stored.
    fn advance_velocities(&mut self, dt: f64) -> Result<(), IntegratorError> {
        profile_scope!("verlet_phase_c");
        let field: &dyn FieldCalculator = &*self.field;
        let acceleration = &self.acceleration;
        let collision = self.collision.as_deref();
        let random: &RandomGeneratorPool = &self.random;
        let (time, timestep) = (self.time + dt, self.timestep + 1);

        self.particles
            .par_iter_mut()
            .zip(self.slots.par_iter_mut())
            .enumerate()
            .try_for_each(|(i, (p, slot))| -> Result<(), IntegratorError> {
                if !slot.registered {
                    return Ok(());
                }
                let mut a = acceleration(&mut *p, i, field, time, timestep)?;
                if let Some(model) = collision {
                    model.modify_acceleration(&mut a, p, dt);
                }
                if slot.has_a_t && !slot.relocated {
                    p.velocity += (slot.a_t + a) * (0.5 * dt);
                    if let Some(model) = collision {
                        let mut rng = random.thread_source();
                        model.modify_velocity(p, dt, &mut **rng);
                    }
                }
                slot.a_t = a;
                slot.has_a_t = true;
                slot.relocated = false;
                Ok(())
            })
    }

    /// Advance the simulation by `dt`.
    pub fn run_single_step(&mut self, dt: f64) -> Result<(), IntegratorError> {
        match self.state {
            RunState::Terminated => return Err(IntegratorError::AlreadyTerminated),
            RunState::Idle => self.state = RunState::Running,
            RunState::Running | RunState::InTermination => {}
        }

        self.bear_particles(self.time)?;
        self.prime_accelerations(dt)?;
        self.advance_positions(dt);

        self.sync_field_calculator()?;
        self.bear_particles(self.time + dt)?;
        self.field.compute_charge_distribution();
        self.advance_velocities(dt)?;

        self.time += dt;
        self.timestep += 1;
        if let Some(write) = self.timestep_write.as_mut() {
            write(self.particles.as_slice(), self.time, self.timestep, false);
        }
        Ok(())
    }

    /// Run up to `steps` steps, stopping early on a termination request or
    /// when no particle is active any more. Finalizes exactly once.
    pub fn run(&mut self, steps: usize, dt: f64) -> Result<(), IntegratorError> {
        if self.state == RunState::Terminated {
            return Err(IntegratorError::AlreadyTerminated);
        }
        info!(particles = self.particles.len(), steps, dt, "starting verlet integration");
        self.state = RunState::Running;

        if !self.started {
            self.started = true;
            self.bear_particles(self.time)?;
            if let Some(write) = self.timestep_write.as_mut() {
                write(self.particles.as_slice(), self.time, self.timestep, false);
            }
        }

        for _ in 0..steps {
            self.run_single_step(dt)?;
            if self.termination.is_requested() {
                info!(timestep = self.timestep, "termination requested");
                self.state = RunState::InTermination;
                break;
            }
            if self.all_particles_inactive() {
                info!(timestep = self.timestep, "all particles inactive");
                self.state = RunState::InTermination;
                break;
            }
        }

        self.finalize();
        Ok(())
    }

    /// Write the last timestep and terminate. Later calls do nothing.
    pub fn finalize(&mut self) {
        if self.state == RunState::Terminated {
            return;
        }
        if let Some(write) = self.timestep_write.as_mut() {
            write(self.particles.as_slice(), self.time, self.timestep, true);
        }
        self.state = RunState::Terminated;
        info!(time = self.time, timesteps = self.timestep, "integration finalized");
    }
}
