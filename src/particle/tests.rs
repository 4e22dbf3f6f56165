use super::*;
use ultraviolet::DVec3;

#[test]
fn ids_are_unique() {
    let a = Particle::new(DVec3::zero(), DVec3::zero(), 1.0, 1.0);
    let b = Particle::new(DVec3::zero(), DVec3::zero(), 1.0, 1.0);
    assert_ne!(a.id, b.id);
    assert!(b.id.get() > a.id.get());
}

#[test]
fn ion_constructor_converts_to_si() {
    let p = Particle::ion(DVec3::new(1.0, 2.0, 3.0), 2.0, 100.0);
    assert!((p.charge - 2.0 * crate::units::ELEMENTARY_CHARGE).abs() < 1e-30);
    assert!((p.mass - 100.0 * crate::units::AMU).abs() < 1e-35);
    assert!(p.active);
    assert!(p.splat_time.is_none());
}

#[test]
fn deactivate_records_splat_time() {
    let mut p = Particle::new(DVec3::zero(), DVec3::zero(), 1.0, 1.0);
    p.deactivate(2.5e-6);
    assert!(!p.active);
    assert_eq!(p.splat_time, Some(2.5e-6));

    p.restart(DVec3::new(0.0, 0.0, 1.0), DVec3::zero(), 3.0e-6);
    assert!(p.active);
    assert!(p.splat_time.is_none());
    assert_eq!(p.time_of_birth, 3.0e-6);
}

#[test]
fn birth_time_gates_presence() {
    let p = Particle::new(DVec3::zero(), DVec3::zero(), 1.0, 1.0).with_time_of_birth(1.0);
    assert!(!p.is_born(0.5));
    assert!(p.is_born(1.0));
}

#[test]
fn attributes_overwrite_by_key() {
    let mut p = Particle::new(DVec3::zero(), DVec3::zero(), 1.0, 1.0);
    p.set_float_attribute("temperature", 300.0);
    p.set_float_attribute("temperature", 310.0);
    p.set_int_attribute("collisions", 4);
    assert_eq!(p.float_attribute("temperature"), Some(310.0));
    assert_eq!(p.float_attributes().count(), 1);
    assert_eq!(p.int_attribute("collisions"), Some(4));
    assert_eq!(p.int_attribute("missing"), None);
}
