use super::*;
use crate::random::FixedSequenceSource;

struct Drag(f64);

impl CollisionModel for Drag {
    fn modify_acceleration(&self, acceleration: &mut DVec3, particle: &Particle, _dt: f64) {
        *acceleration -= particle.velocity * self.0;
    }
}

struct Kick;

impl CollisionModel for Kick {
    fn initialize_particle_parameters(&self, particle: &mut Particle) {
        particle.set_int_attribute("kicks", 0);
    }

    fn modify_velocity(&self, particle: &mut Particle, _dt: f64, rng: &mut dyn RandomSource) {
        particle.velocity.x += rng.normal();
        let n = particle.int_attribute("kicks").unwrap_or(0);
        particle.set_int_attribute("kicks", n + 1);
    }
}

#[test]
fn default_hooks_leave_state_alone() {
    struct Inert;
    impl CollisionModel for Inert {}

    let mut p = Particle::new(DVec3::zero(), DVec3::new(1.0, 2.0, 3.0), 1.0, 1.0);
    let mut acc = DVec3::new(4.0, 5.0, 6.0);
    let mut pos = DVec3::new(7.0, 8.0, 9.0);
    let mut rng = FixedSequenceSource::new();
    Inert.modify_acceleration(&mut acc, &p, 0.1);
    Inert.modify_position(&mut pos, &p, 0.1, &mut rng);
    Inert.modify_velocity(&mut p, 0.1, &mut rng);
    assert_eq!(acc, DVec3::new(4.0, 5.0, 6.0));
    assert_eq!(pos, DVec3::new(7.0, 8.0, 9.0));
    assert_eq!(p.velocity, DVec3::new(1.0, 2.0, 3.0));
}

#[test]
fn multi_model_applies_each_model_in_order() {
    let mut model = MultiCollisionModel::new(vec![Box::new(Drag(0.5)) as Box<dyn CollisionModel>]);
    model.push(Box::new(Kick));
    model.push(Box::new(Kick));
    assert_eq!(model.len(), 3);

    let mut p = Particle::new(DVec3::zero(), DVec3::new(2.0, 0.0, 0.0), 1.0, 1.0);
    model.initialize_particle_parameters(&mut p);
    assert_eq!(p.int_attribute("kicks"), Some(0));

    let mut acc = DVec3::zero();
    model.modify_acceleration(&mut acc, &p, 1e-3);
    assert_eq!(acc, DVec3::new(-1.0, 0.0, 0.0));

    // normal sequence starts 0.0, 1.0
    let mut rng = FixedSequenceSource::new();
    model.modify_velocity(&mut p, 1e-3, &mut rng);
    assert_eq!(p.velocity.x, 3.0);
    assert_eq!(p.int_attribute("kicks"), Some(2));
}
