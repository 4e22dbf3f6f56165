// Centralized configuration for simulation parameters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use ultraviolet::DVec3;

use crate::units;

// ====================
// Space Charge Solver
// ====================
/// Barnes-Hut opening angle (cell size / distance).
pub const TREE_THETA: f64 = 0.5;
/// Particles a leaf holds before it is split.
pub const TREE_LEAF_CAPACITY: usize = 1;
/// Depth at which leaves stop splitting (coincident particles).
pub const TREE_MAX_DEPTH: usize = 32;
/// Softening length in metres; 0 disables softening.
pub const SOFTENING_LENGTH_M: f64 = 0.0;
/// Half width of the initial tree domain; the tree grows past it on demand.
pub const DOMAIN_HALF_WIDTH_M: f64 = 0.01;

// ====================
// Integration
// ====================
pub const DEFAULT_DT_S: f64 = 1.0e-8;
pub const DEFAULT_STEPS: usize = 2000;
pub const DEFAULT_WRITE_INTERVAL: usize = 50;
/// Multiplier on the space-charge field (macro-particle weighting).
pub const SPACE_CHARGE_FACTOR: f64 = 10.0;

// ====================
// Default Scenario
// ====================
pub const DEFAULT_ION_COUNT: usize = 500;
pub const DEFAULT_ION_CHARGE_E: f64 = 1.0;
pub const DEFAULT_LIGHT_ION_MASS_AMU: f64 = 100.0;
pub const DEFAULT_HEAVY_ION_MASS_AMU: f64 = 200.0;
pub const DEFAULT_START_ZONE_SIZE_M: f64 = 1.0e-3;
pub const DEFAULT_BOUNDARY_HALF_WIDTH_M: f64 = 5.0e-3;

pub fn to_dvec3(v: [f64; 3]) -> DVec3 {
    DVec3::new(v[0], v[1], v[2])
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    BarnesHut,
    Direct,
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BarnesHut => "barnes_hut",
            Self::Direct => "direct",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpaceChargeConfig {
    pub solver: SolverKind,
    pub theta: f64,
    pub leaf_capacity: usize,
    pub max_depth: usize,
    pub softening_m: f64,
    pub coulomb_constant: f64,
    pub domain_min_m: [f64; 3],
    pub domain_max_m: [f64; 3],
}

impl Default for SpaceChargeConfig {
    fn default() -> Self {
        Self {
            solver: SolverKind::BarnesHut,
            theta: TREE_THETA,
            leaf_capacity: TREE_LEAF_CAPACITY,
            max_depth: TREE_MAX_DEPTH,
            softening_m: SOFTENING_LENGTH_M,
            coulomb_constant: units::COULOMB_CONSTANT,
            domain_min_m: [-DOMAIN_HALF_WIDTH_M; 3],
            domain_max_m: [DOMAIN_HALF_WIDTH_M; 3],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum StartZoneConfig {
    Box { center_m: [f64; 3], size_m: [f64; 3] },
    Sphere { center_m: [f64; 3], radius_m: f64 },
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ParticleGroupConfig {
    pub count: usize,
    pub charge_elementary: f64,
    pub mass_amu: f64,
    /// Births are spread evenly over `[0, birth_interval_s)`.
    #[serde(default)]
    pub birth_interval_s: f64,
    pub start_zone: StartZoneConfig,
}

/// Box outside of which particles splat. The external field is only
/// defined inside it.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BoundaryConfig {
    pub min_m: [f64; 3],
    pub max_m: [f64; 3],
    /// Put leaving particles back into their group's start zone instead of
    /// terminating them.
    #[serde(default)]
    pub restart: bool,
}

impl BoundaryConfig {
    pub fn contains(&self, p: DVec3) -> bool {
        let (min, max) = (to_dvec3(self.min_m), to_dvec3(self.max_m));
        p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y && p.z >= min.z && p.z <= max.z
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    pub enabled: bool,
    pub path: String,
    pub gzip: bool,
    pub velocities: bool,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "space_charge_trajectory.jsonl".to_owned(),
            gzip: false,
            velocities: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub steps: usize,
    pub dt_s: f64,
    pub write_interval: usize,
    pub space_charge_factor: f64,
    pub electric_field_v_per_m: [f64; 3],
    pub threads: Option<usize>,
    pub random_seed: Option<u64>,
    pub space_charge: SpaceChargeConfig,
    pub boundary: Option<BoundaryConfig>,
    pub trajectory: TrajectoryConfig,
    /// Initial ions read from a JSON file instead of generated from `groups`.
    /// Relative paths are taken relative to the configuration file.
    pub ion_cloud_file: Option<String>,
    pub groups: Vec<ParticleGroupConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let zone = StartZoneConfig::Box {
            center_m: [0.0; 3],
            size_m: [DEFAULT_START_ZONE_SIZE_M; 3],
        };
        Self {
            steps: DEFAULT_STEPS,
            dt_s: DEFAULT_DT_S,
            write_interval: DEFAULT_WRITE_INTERVAL,
            space_charge_factor: SPACE_CHARGE_FACTOR,
            electric_field_v_per_m: [0.0; 3],
            threads: None,
            random_seed: None,
            space_charge: SpaceChargeConfig::default(),
            boundary: Some(BoundaryConfig {
                min_m: [-DEFAULT_BOUNDARY_HALF_WIDTH_M; 3],
                max_m: [DEFAULT_BOUNDARY_HALF_WIDTH_M; 3],
                restart: false,
            }),
            trajectory: TrajectoryConfig::default(),
            ion_cloud_file: None,
            groups: vec![
                ParticleGroupConfig {
                    count: DEFAULT_ION_COUNT,
                    charge_elementary: DEFAULT_ION_CHARGE_E,
                    mass_amu: DEFAULT_LIGHT_ION_MASS_AMU,
                    birth_interval_s: 0.0,
                    start_zone: zone.clone(),
                },
                ParticleGroupConfig {
                    count: DEFAULT_ION_COUNT,
                    charge_elementary: DEFAULT_ION_CHARGE_E,
                    mass_amu: DEFAULT_HEAVY_ION_MASS_AMU,
                    birth_interval_s: 100.0 * DEFAULT_DT_S,
                    start_zone: zone,
                },
            ],
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read configuration: {e}"),
            Self::Parse(e) => write!(f, "cannot parse configuration: {e}"),
            Self::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e)
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

impl SimulationConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let (Some(file), Some(dir)) = (config.ion_cloud_file.as_mut(), path.parent()) {
            if Path::new(file.as_str()).is_relative() {
                *file = dir.join(file.as_str()).display().to_string();
            }
        }
        tracing::info!(path = %path.display(), groups = config.groups.len(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn total_particles(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dt_s > 0.0 && self.dt_s.is_finite()) {
            return Err(invalid(format!("dt_s must be positive, got {}", self.dt_s)));
        }
        if self.write_interval == 0 {
            return Err(invalid("write_interval must be at least 1"));
        }
        if !self.space_charge_factor.is_finite() {
            return Err(invalid("space_charge_factor must be finite"));
        }
        if self.threads == Some(0) {
            return Err(invalid("threads must be at least 1"));
        }

        let sc = &self.space_charge;
        if !(sc.theta >= 0.0 && sc.theta.is_finite()) {
            return Err(invalid(format!("theta must be a finite non-negative number, got {}", sc.theta)));
        }
        if sc.leaf_capacity == 0 {
            return Err(invalid("leaf_capacity must be at least 1"));
        }
        if sc.max_depth == 0 {
            return Err(invalid("max_depth must be at least 1"));
        }
        if !(sc.softening_m >= 0.0 && sc.softening_m.is_finite()) {
            return Err(invalid("softening_m must be finite and non-negative"));
        }
        if !(sc.coulomb_constant > 0.0 && sc.coulomb_constant.is_finite()) {
            return Err(invalid("coulomb_constant must be positive"));
        }
        check_box("space_charge domain", sc.domain_min_m, sc.domain_max_m)?;

        if let Some(boundary) = &self.boundary {
            check_box("boundary", boundary.min_m, boundary.max_m)?;
        }

        if self.ion_cloud_file.is_none() && self.groups.is_empty() {
            return Err(invalid("at least one particle group or an ion_cloud_file is required"));
        }
        if let Some(boundary) = &self.boundary {
            if boundary.restart && self.ion_cloud_file.is_some() {
                return Err(invalid("boundary restart needs start zones, not an ion_cloud_file"));
            }
        }
        for (i, group) in self.groups.iter().enumerate() {
            if !(group.mass_amu > 0.0 && group.mass_amu.is_finite()) {
                return Err(invalid(format!("group {i}: mass_amu must be positive")));
            }
            if !group.charge_elementary.is_finite() {
                return Err(invalid(format!("group {i}: charge_elementary must be finite")));
            }
            if !(group.birth_interval_s >= 0.0 && group.birth_interval_s.is_finite()) {
                return Err(invalid(format!("group {i}: birth_interval_s must be non-negative")));
            }
            match &group.start_zone {
                StartZoneConfig::Box { size_m, .. } => {
                    if size_m.iter().any(|s| !(*s > 0.0)) {
                        return Err(invalid(format!("group {i}: start zone size must be positive")));
                    }
                }
                StartZoneConfig::Sphere { radius_m, .. } => {
                    if !(*radius_m > 0.0) {
                        return Err(invalid(format!("group {i}: start zone radius must be positive")));
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_box(name: &str, min: [f64; 3], max: [f64; 3]) -> Result<(), ConfigError> {
    for axis in 0..3 {
        if !(min[axis] < max[axis]) {
            return Err(invalid(format!(
                "{name}: min must be below max on every axis (axis {axis}: {} >= {})",
                min[axis], max[axis]
            )));
        }
    }
    Ok(())
}
