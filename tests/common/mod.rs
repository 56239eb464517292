#![allow(dead_code)]

use occult::constants::{LSUN, MSUN, RSUN};
use occult::orbital::{Body, OrbitalElements, PlanetParams, System, SystemSettings};

/// Quadratic limb-darkening coefficients of a Sun-like star.
pub const SUN_LIMB_DARKENING: [f64; 2] = [0.40, 0.26];

/// `n` evenly spaced values from `start` to `end`, both included.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Sun-like limb-darkened star.
pub fn sun() -> Body {
    let mut star = Body::star(RSUN, LSUN, MSUN).unwrap();
    star.map_mut().limb_darken(&SUN_LIMB_DARKENING).unwrap();
    star
}

/// Planet on an edge-on circular orbit transiting at `t = 0`.
pub fn transiting_planet(params: PlanetParams) -> Body {
    let params = PlanetParams {
        elements: OrbitalElements {
            lambda0: std::f64::consts::FRAC_PI_2,
            ..params.elements
        },
        ..params
    };
    Body::planet(&params).unwrap()
}

/// Sun-like star with a tidally locked hot Jupiter on a one-day orbit.
pub fn hot_jupiter_system() -> System {
    let mut planet = transiting_planet(PlanetParams::default());
    planet.map_mut().set_coefficient(0, 0, 3.0).unwrap();
    planet.map_mut().set_coefficient(1, 1, 1.0).unwrap();
    System::new(sun(), vec![planet], SystemSettings::default()).unwrap()
}

/// First channel of the system flux.
pub fn system_flux(system: &System) -> Vec<f64> {
    system.flux().column(0).iter().copied().collect()
}
