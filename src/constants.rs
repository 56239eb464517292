//! # Constants and type definitions for Occult
//!
//! This module centralizes the **physical constants**, **numerical tolerances**, and
//! **unit type aliases** shared by the map, solver, and orbital modules.
//!
//! ## Overview
//!
//! - Solar and Jovian reference values (mass, radius, luminosity)
//! - Gravitational constant and the length of a day
//! - Floating-point tolerances used to drop negligible map coefficients
//! - Type aliases documenting the unit carried by a plain `f64`
//!
//! All physical constants are expressed in **SI units** (m, kg, W, s). They are
//! environment-independent and are used as defaults when building bodies.

// -------------------------------------------------------------------------------------------------
// Physical constants
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Newtonian gravitational constant (m³ kg⁻¹ s⁻²)
pub const BIGG: f64 = 6.674_08e-11;

/// Length of a day in seconds
pub const DAY: f64 = 86_400.0;

/// Nominal solar mass (kg)
pub const MSUN: f64 = 1.988_475e30;

/// Nominal solar radius (m)
pub const RSUN: f64 = 6.957e8;

/// Nominal solar luminosity (W)
pub const LSUN: f64 = 3.828e26;

/// Jupiter equatorial radius (m)
pub const RJUP: f64 = 7.149_2e7;

// -------------------------------------------------------------------------------------------------
// Numerical tolerances
// -------------------------------------------------------------------------------------------------

/// Machine epsilon for `f64`
pub const MACH_EPS: f64 = f64::EPSILON;

/// Coefficients whose magnitude is below this threshold are treated as zero
/// (sparsity skip-list, map summaries, polynomial evaluation).
pub const COEFF_TOL: f64 = 10.0 * MACH_EPS;

/// Default tolerance on the residual of Kepler's equation
pub const KEPLER_EPS: f64 = 1.0e-7;

/// Default iteration cap of the Kepler solver
pub const KEPLER_MAXITER: usize = 100;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in radians
pub type Radian = f64;
/// Distance in meters
pub type Meter = f64;
/// Mass in kilograms
pub type Kilogram = f64;
/// Luminosity in watts
pub type Watt = f64;
/// Time in seconds
pub type Second = f64;
