//! Physical constants and unit conversions.
//!
//! The simulation core works in SI units throughout:
//! - Length: metre (m)
//! - Time: second (s)
//! - Charge: coulomb (C)
//! - Mass: kilogram (kg)

/// Elementary charge in coulombs.
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;
/// Atomic mass unit in kilograms.
pub const AMU: f64 = 1.660_539_066_60e-27;
/// Vacuum permittivity in F/m.
pub const ELECTRIC_CONSTANT: f64 = 8.854_187_812_8e-12;
/// Coulomb's constant 1/(4 pi eps0) in N m^2 / C^2.
pub const COULOMB_CONSTANT: f64 = 8.987_551_792_3e9;

/// Millimetre in metres.
pub const MILLIMETRE: f64 = 1.0e-3;
/// Microsecond in seconds.
pub const MICROSECOND: f64 = 1.0e-6;

/// Convert a charge in multiples of the elementary charge to coulombs.
pub fn elementary_to_coulomb(charge: f64) -> f64 {
    charge * ELEMENTARY_CHARGE
}

/// Convert a mass in atomic mass units to kilograms.
pub fn amu_to_kg(mass: f64) -> f64 {
    mass * AMU
}
