use super::*;
use crate::particle::Particle;
use ultraviolet::DVec3;

fn unit_charge(x: f64, y: f64, z: f64) -> Particle {
    Particle::new(DVec3::new(x, y, z), DVec3::zero(), 1.0, 1.0)
}

mod registry {
    use super::*;

    #[test]
    fn insert_resolves_through_both_maps() {
        let a = unit_charge(0.0, 0.0, 0.0);
        let b = unit_charge(1.0, 0.0, 0.0);
        let mut reg = ParticleRegistry::new();
        let ka = reg.insert(a.id, 3, "a").unwrap();
        let kb = reg.insert(b.id, 7, "b").unwrap();

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.key_by_index(3).unwrap(), ka);
        assert_eq!(reg.key_by_particle(b.id).unwrap(), kb);
        assert_eq!(reg[kb].ext_index, 7);
        let order: Vec<_> = reg.iter().map(|(_, e)| e.payload).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_keys_are_rejected_without_side_effects() {
        let a = unit_charge(0.0, 0.0, 0.0);
        let b = unit_charge(0.0, 0.0, 0.0);
        let mut reg = ParticleRegistry::new();
        reg.insert(a.id, 0, ()).unwrap();

        assert_eq!(reg.insert(b.id, 0, ()), Err(SpaceChargeError::DuplicateIndex(0)));
        assert_eq!(reg.insert(a.id, 1, ()), Err(SpaceChargeError::DuplicateParticle(a.id)));
        assert_eq!(reg.len(), 1);
        assert!(reg.key_by_particle(b.id).is_err());
    }

    #[test]
    fn removal_unlinks_everywhere() {
        let ps: Vec<_> = (0..4).map(|i| unit_charge(i as f64, 0.0, 0.0)).collect();
        let mut reg = ParticleRegistry::new();
        for (i, p) in ps.iter().enumerate() {
            reg.insert(p.id, i, i).unwrap();
        }

        let removed = reg.remove(1).unwrap();
        assert_eq!(removed.id, ps[1].id);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.key_by_index(1), Err(SpaceChargeError::UnknownIndex(1)));
        assert_eq!(
            reg.key_by_particle(ps[1].id),
            Err(SpaceChargeError::UnknownParticle(ps[1].id))
        );
        let order: Vec<_> = reg.iter().map(|(_, e)| e.payload).collect();
        assert_eq!(order, vec![0, 2, 3]);

        // head and tail
        reg.remove(0).unwrap();
        reg.remove(3).unwrap();
        let order: Vec<_> = reg.iter().map(|(_, e)| e.payload).collect();
        assert_eq!(order, vec![2]);
    }

    #[test]
    fn double_removal_fails_loudly() {
        let p = unit_charge(0.0, 0.0, 0.0);
        let mut reg = ParticleRegistry::new();
        reg.insert(p.id, 5, ()).unwrap();
        reg.remove(5).unwrap();
        assert!(matches!(reg.remove(5), Err(SpaceChargeError::UnknownIndex(5))));
        assert!(reg.is_empty());
    }

    #[test]
    fn freed_slots_are_reused() {
        let a = unit_charge(0.0, 0.0, 0.0);
        let b = unit_charge(0.0, 0.0, 0.0);
        let mut reg = ParticleRegistry::new();
        let ka = reg.insert(a.id, 0, 1.0).unwrap();
        reg.remove(0).unwrap();
        let kb = reg.insert(b.id, 1, 2.0).unwrap();
        assert_eq!(ka, kb);
        assert_eq!(reg[kb].id, b.id);
        assert_eq!(reg.iter().count(), 1);
    }
}

mod kernel {
    use super::*;

    #[test]
    fn coulomb_field_points_away_from_positive_source() {
        let s = coulomb_sample(DVec3::new(2.0, 0.0, 0.0), 1.0, 1.0, 0.0);
        assert!((s.field.x - 0.25).abs() < 1e-15);
        assert_eq!(s.field.y, 0.0);
        assert!((s.potential - 0.5).abs() < 1e-15);
    }

    #[test]
    fn zero_separation_contributes_nothing() {
        let s = coulomb_sample(DVec3::zero(), 1.0, 1.0, 1e-3);
        assert_eq!(s, FieldSample::default());
    }

    #[test]
    fn softening_bounds_close_encounters() {
        let hard = coulomb_sample(DVec3::new(1e-6, 0.0, 0.0), 1.0, 1.0, 0.0);
        let soft = coulomb_sample(DVec3::new(1e-6, 0.0, 0.0), 1.0, 1.0, 1e-6);
        assert!(soft.field.x < hard.field.x);
        assert!(soft.field.x.is_finite());
    }
}

mod direct {
    use super::*;

    fn solver() -> DirectSumSolver {
        DirectSumSolver::new(1.0, 0.0)
    }

    #[test]
    fn pair_repels_symmetrically() {
        let a = unit_charge(-0.5, 0.0, 0.0);
        let b = unit_charge(0.5, 0.0, 0.0);
        let mut s = solver();
        s.insert_particle(&a, 0).unwrap();
        s.insert_particle(&b, 1).unwrap();
        s.compute_charge_distribution();

        let ea = s.e_field_from_space_charge(&a).unwrap();
        let eb = s.e_field_from_space_charge(&b).unwrap();
        assert!((ea.x + 1.0).abs() < 1e-12);
        assert!((eb.x - 1.0).abs() < 1e-12);
        assert_eq!(ea.y, 0.0);
        assert_eq!(eb.z, 0.0);
        assert!((s.sample_space_charge(&a).unwrap().potential - 1.0).abs() < 1e-12);
    }

    #[test]
    fn stale_query_is_rejected() {
        let a = unit_charge(0.0, 0.0, 0.0);
        let mut s = solver();
        s.insert_particle(&a, 0).unwrap();
        assert_eq!(
            s.sample_space_charge(&a),
            Err(SpaceChargeError::StaleChargeDistribution)
        );
        s.compute_charge_distribution();
        assert_eq!(s.e_field_from_space_charge(&a).unwrap(), DVec3::zero());
    }

    #[test]
    fn update_checks_identity() {
        let a = unit_charge(0.0, 0.0, 0.0);
        let b = unit_charge(1.0, 0.0, 0.0);
        let mut s = solver();
        s.insert_particle(&a, 0).unwrap();
        assert!(matches!(
            s.update_particle(&b, 0),
            Err(SpaceChargeError::ParticleMismatch { index: 0, .. })
        ));
        assert_eq!(s.update_particle(&b, 9), Err(SpaceChargeError::UnknownIndex(9)));
    }

    #[test]
    fn removal_restores_count_and_fields() {
        let ps: Vec<_> = (0..3).map(|i| unit_charge(i as f64, 0.5 * i as f64, 0.0)).collect();
        let extra = unit_charge(0.3, -0.2, 0.7);
        let mut s = solver();
        for (i, p) in ps.iter().enumerate() {
            s.insert_particle(p, i).unwrap();
        }
        s.compute_charge_distribution();
        let before: Vec<_> = ps.iter().map(|p| s.sample_space_charge(p).unwrap()).collect();

        s.insert_particle(&extra, 10).unwrap();
        s.compute_charge_distribution();
        s.remove_particle(10).unwrap();
        s.compute_charge_distribution();

        assert_eq!(s.number_of_particles(), 3);
        for (p, b) in ps.iter().zip(before) {
            let after = s.sample_space_charge(p).unwrap();
            assert!((after.field - b.field).mag() <= 1e-12 * b.field.mag().max(1.0));
        }
        assert!(s.remove_particle(10).is_err());
    }

    #[test]
    fn nan_location_is_rejected() {
        let p = unit_charge(f64::NAN, 0.0, 0.0);
        let mut s = solver();
        assert_eq!(
            s.insert_particle(&p, 0),
            Err(SpaceChargeError::NonFiniteLocation { index: 0 })
        );
        assert_eq!(s.number_of_particles(), 0);
    }
}
