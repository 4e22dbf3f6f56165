//! Ion cloud files: initial ions given explicitly instead of drawn from start zones.
//!
//! JSON, optionally gzip compressed (detected from the content, not the name):
//!
//! ```json
//! { "ions": [ { "location_m": [0.0, 0.0, 0.0], "charge_elementary": 1.0, "mass_amu": 100.0 } ] }
//! ```

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::Path;

use crate::config::{to_dvec3, SimulationConfig};
use crate::particle::Particle;
use crate::random::RandomGeneratorPool;
use crate::start_zone;
use crate::units;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IonRecord {
    pub location_m: [f64; 3],
    #[serde(default)]
    pub velocity_m_per_s: [f64; 3],
    pub charge_elementary: f64,
    pub mass_amu: f64,
    #[serde(default)]
    pub time_of_birth_s: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IonCloud {
    pub ions: Vec<IonRecord>,
}

impl IonRecord {
    pub fn from_particle(p: &Particle) -> Self {
        Self {
            location_m: [p.location.x, p.location.y, p.location.z],
            velocity_m_per_s: [p.velocity.x, p.velocity.y, p.velocity.z],
            charge_elementary: p.charge / units::ELEMENTARY_CHARGE,
            mass_amu: p.mass / units::AMU,
            time_of_birth_s: p.time_of_birth,
        }
    }

    fn check(&self) -> Result<(), &'static str> {
        if !self.location_m.iter().chain(&self.velocity_m_per_s).all(|v| v.is_finite()) {
            return Err("location and velocity must be finite");
        }
        if !self.charge_elementary.is_finite() {
            return Err("charge must be finite");
        }
        if !(self.mass_amu > 0.0 && self.mass_amu.is_finite()) {
            return Err("mass must be positive");
        }
        if !(self.time_of_birth_s >= 0.0 && self.time_of_birth_s.is_finite()) {
            return Err("time of birth must be non-negative");
        }
        Ok(())
    }

    pub fn to_particle(&self) -> Particle {
        Particle::new(
            to_dvec3(self.location_m),
            to_dvec3(self.velocity_m_per_s),
            units::elementary_to_coulomb(self.charge_elementary),
            units::amu_to_kg(self.mass_amu),
        )
        .with_time_of_birth(self.time_of_birth_s)
    }
}

fn invalid_data<E>(e: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, e)
}

fn maybe_decompress_gzip(data: &[u8]) -> io::Result<Option<Vec<u8>>> {
    if data.len() < 2 || data[0] != 0x1f || data[1] != 0x8b {
        return Ok(None);
    }
    let mut decoded = Vec::new();
    GzDecoder::new(Cursor::new(data)).read_to_end(&mut decoded)?;
    Ok(Some(decoded))
}

pub fn parse_ion_cloud(bytes: &[u8]) -> io::Result<Vec<Particle>> {
    let cloud: IonCloud = serde_json::from_slice(bytes).map_err(invalid_data)?;
    cloud
        .ions
        .iter()
        .enumerate()
        .map(|(i, ion)| {
            ion.check()
                .map(|_| ion.to_particle())
                .map_err(|reason| invalid_data(format!("ion {i}: {reason}")))
        })
        .collect()
}

pub fn read_ion_cloud<P: AsRef<Path>>(path: P) -> io::Result<Vec<Particle>> {
    let data = std::fs::read(path.as_ref())?;
    match maybe_decompress_gzip(&data)? {
        Some(decoded) => parse_ion_cloud(&decoded),
        None => parse_ion_cloud(&data),
    }
}

pub fn write_ion_cloud<P: AsRef<Path>>(path: P, particles: &[Particle], gzip: bool) -> io::Result<()> {
    let cloud = IonCloud {
        ions: particles.iter().map(IonRecord::from_particle).collect(),
    };
    let writer = BufWriter::new(std::fs::File::create(path)?);
    if gzip {
        let mut encoder = GzEncoder::new(writer, Compression::fast());
        serde_json::to_writer(&mut encoder, &cloud).map_err(invalid_data)?;
        encoder.finish()?.flush()
    } else {
        let mut writer = writer;
        serde_json::to_writer_pretty(&mut writer, &cloud).map_err(invalid_data)?;
        writer.flush()
    }
}

/// The run's initial particles: the ion cloud file when one is configured,
/// otherwise every particle group drawn from its start zone.
pub fn initial_particles(cfg: &SimulationConfig, random: &RandomGeneratorPool) -> io::Result<Vec<Particle>> {
    match &cfg.ion_cloud_file {
        Some(path) => {
            let particles = read_ion_cloud(path)?;
            tracing::info!(path = %path, ions = particles.len(), "ion cloud loaded");
            Ok(particles)
        }
        None => Ok(start_zone::spawn_groups(&cfg.groups, random)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultraviolet::DVec3;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ion_space_charge_{}_{name}", std::process::id()))
    }

    #[test]
    fn defaults_fill_velocity_and_birth() {
        let json = br#"{ "ions": [
            { "location_m": [1e-3, 0.0, 0.0], "charge_elementary": 2.0, "mass_amu": 50.0 },
            { "location_m": [0.0, 0.0, 0.0], "velocity_m_per_s": [10.0, 0.0, 0.0],
              "charge_elementary": -1.0, "mass_amu": 50.0, "time_of_birth_s": 2e-6 }
        ] }"#;
        let ions = parse_ion_cloud(json).unwrap();
        assert_eq!(ions.len(), 2);
        assert_eq!(ions[0].velocity, DVec3::zero());
        assert_eq!(ions[0].time_of_birth, 0.0);
        assert!((ions[0].charge - 2.0 * units::ELEMENTARY_CHARGE).abs() < 1e-30);
        assert_eq!(ions[1].velocity.x, 10.0);
        assert!(ions[1].charge < 0.0);
        assert!(!ions[1].is_born(1e-6));
    }

    #[test]
    fn bad_ions_are_rejected_with_their_index() {
        let json = br#"{ "ions": [
            { "location_m": [0.0, 0.0, 0.0], "charge_elementary": 1.0, "mass_amu": 10.0 },
            { "location_m": [0.0, 0.0, 0.0], "charge_elementary": 1.0, "mass_amu": 0.0 }
        ] }"#;
        let err = parse_ion_cloud(json).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("ion 1"), "{err}");

        assert!(parse_ion_cloud(b"{ \"ions\": 3 }").is_err());
    }

    #[test]
    fn gzip_clouds_are_detected_by_content() {
        let path = temp_path("cloud.json");
        let particles = vec![
            Particle::ion(DVec3::new(1e-4, 2e-4, 3e-4), 1.0, 100.0).with_time_of_birth(1e-7),
            Particle::ion(DVec3::zero(), 3.0, 200.0),
        ];
        write_ion_cloud(&path, &particles, true).unwrap();
        let back = read_ion_cloud(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.len(), 2);
        assert!((back[0].location - particles[0].location).mag() < 1e-18);
        assert_eq!(back[0].time_of_birth, 1e-7);
        assert!((back[1].mass - particles[1].mass).abs() / particles[1].mass < 1e-12);
    }

    #[test]
    fn groups_are_used_without_a_cloud_file() {
        let cfg = SimulationConfig::default();
        let particles = initial_particles(&cfg, &RandomGeneratorPool::deterministic()).unwrap();
        assert_eq!(particles.len(), cfg.total_particles());
        assert_eq!(particles[0].int_attribute(start_zone::GROUP_ATTRIBUTE), Some(0));
        assert_eq!(particles.last().unwrap().int_attribute(start_zone::GROUP_ATTRIBUTE), Some(1));
    }
}
