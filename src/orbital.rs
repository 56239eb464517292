//! # Orbital light curves
//!
//! Keplerian motion of a star and its satellites, with pairwise occultation detection and
//! flux summation over a grid of epochs.
//!
//! ## Model
//!
//! * The [`BodyRole::Primary`] body sits at the origin; each [`BodyRole::Satellite`] follows a
//!   fixed two-body Keplerian orbit around it. Semi-major axes are derived from the orbital
//!   periods and the primary mass through Kepler's third law when the [`System`] is built.
//! * The observer looks down the `-z` axis: at each epoch, for every pair of bodies the one
//!   with the larger `z` is the occultor. When the projected disks overlap, the occulted body's
//!   flux is computed with the occultor's offset and radius, both in units of the occulted
//!   body's radius.
//! * A body occulted by several others in the same epoch keeps the result of the **last**
//!   qualifying pair (pairs are visited as `(0,1), (0,2), …, (1,2), …`). Overlapping occultors
//!   are not combined.
//! * Body flux is `L · map.flux(θ(t), xo, yo, ro)`, per wavelength channel; the system flux is
//!   the sum over bodies.
//!
//! ## Parallelism
//!
//! Epochs are independent once the system is built, so [`System::compute`] spreads them over
//! the rayon thread pool. Each worker owns one [`Wigner`] scratch buffer per body; the
//! collected results keep epoch order, so the output matches a serial run bit for bit.
//!
//! ## Example
//!
//! ```rust
//! use occult::constants::{DAY, LSUN, MSUN, RSUN};
//! use occult::orbital::{Body, PlanetParams, System, SystemSettings};
//!
//! let mut star = Body::star(RSUN, LSUN, MSUN).unwrap();
//! star.map_mut().limb_darken(&[0.4, 0.26]).unwrap();
//! let planet = Body::planet(&PlanetParams::default()).unwrap();
//!
//! let mut system = System::new(star, vec![planet], SystemSettings::default()).unwrap();
//! let time: Vec<f64> = (0..100).map(|i| i as f64 * DAY / 100.0).collect();
//! system.compute(&time).unwrap();
//! assert_eq!(system.flux().nrows(), 100);
//! ```

use std::f64::consts::FRAC_PI_2;

use itertools::Itertools;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{
    Kilogram, Meter, Radian, Second, Watt, BIGG, DAY, DPI, KEPLER_EPS, KEPLER_MAXITER, LSUN, RJUP,
};
use crate::kepler::{principal_angle, solve_kepler, true_anomaly, KeplerSolution};
use crate::maps::SurfaceMap;
use crate::occult_errors::OccultError;
use crate::rotation::Wigner;

/// Place of a body in a [`System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyRole {
    /// Fixed at the origin; its mass sets the orbits of the satellites.
    Primary,
    /// On a Keplerian orbit around the primary.
    Satellite,
}

/// Kepler solver settings shared by every satellite of a [`System`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    /// Tolerance on the residual of Kepler's equation.
    pub eps: f64,
    /// Iteration cap of the Kepler solver.
    pub maxiter: usize,
}

impl Default for SystemSettings {
    fn default() -> Self {
        SystemSettings {
            eps: KEPLER_EPS,
            maxiter: KEPLER_MAXITER,
        }
    }
}

/// Orbital elements of a satellite.
///
/// Units:
/// * `porb`, `tref`: s
/// * `inc`, `w`, `omega`, `lambda0`: radians
/// * `ecc`: unitless
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitalElements {
    /// Orbital period.
    pub porb: Second,
    /// Inclination; `π/2` is edge-on.
    pub inc: Radian,
    pub ecc: f64,
    /// Argument of periapsis.
    pub w: Radian,
    /// Longitude of the ascending node.
    #[serde(rename = "Omega")]
    pub omega: Radian,
    /// Mean longitude at `tref`.
    pub lambda0: Radian,
    /// Reference epoch.
    pub tref: Second,
}

impl Default for OrbitalElements {
    fn default() -> Self {
        OrbitalElements {
            porb: DAY,
            inc: FRAC_PI_2,
            ecc: 0.0,
            w: 0.0,
            omega: 0.0,
            lambda0: 0.0,
            tref: 0.0,
        }
    }
}

/// Construction parameters of a planet or moon.
///
/// The default is a tidally locked hot Jupiter on a one-day, edge-on, circular orbit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetParams {
    /// Degree of the surface map.
    pub lmax: usize,
    /// Radius.
    pub r: Meter,
    /// Luminosity scaling the map flux.
    #[serde(rename = "L")]
    pub luminosity: Watt,
    /// Rotation axis of the map, any non-zero length.
    pub axis: [f64; 3],
    /// Rotation period; zero or infinite for a non-rotating body.
    pub prot: Second,
    /// Rotational phase at `tref`.
    pub theta0: Radian,
    #[serde(flatten)]
    pub elements: OrbitalElements,
}

impl Default for PlanetParams {
    fn default() -> Self {
        PlanetParams {
            lmax: 2,
            r: RJUP,
            luminosity: 1e-5 * LSUN,
            axis: [0.0, 1.0, 0.0],
            prot: DAY,
            theta0: 0.0,
            elements: OrbitalElements::default(),
        }
    }
}

/// A star, planet or moon: surface map, spin, orbit and the per-epoch results of the last
/// [`System::compute`].
#[derive(Debug, Clone)]
pub struct Body {
    role: BodyRole,
    map: SurfaceMap,
    r: Meter,
    luminosity: Watt,
    m: Kilogram,
    prot: Second,
    theta0: Radian,
    elements: OrbitalElements,
    a: Meter,
    eps: f64,
    maxiter: usize,
    kepler_error: Option<OccultError>,
    x: Vec<Meter>,
    y: Vec<Meter>,
    z: Vec<Meter>,
    flux: DMatrix<f64>,
}

impl Body {
    /// A non-rotating primary with a degree-2 map, initially a uniform disk of unit flux.
    ///
    /// Arguments
    /// ---------
    /// * `r` – radius (m).
    /// * `luminosity` – luminosity (W).
    /// * `m` – mass (kg).
    pub fn star(r: Meter, luminosity: Watt, m: Kilogram) -> Result<Self, OccultError> {
        let mut map = SurfaceMap::new(2)?;
        map.limb_darken(&[])?;
        let elements = OrbitalElements {
            porb: f64::INFINITY,
            inc: 0.0,
            ..OrbitalElements::default()
        };
        Ok(Body::new(
            BodyRole::Primary,
            map,
            r,
            luminosity,
            m,
            f64::INFINITY,
            0.0,
            elements,
        ))
    }

    /// A massless satellite with an empty map of degree `params.lmax`.
    pub fn planet(params: &PlanetParams) -> Result<Self, OccultError> {
        let mut map = SurfaceMap::new(params.lmax)?;
        let [ax, ay, az] = params.axis;
        map.set_axis(Vector3::new(ax, ay, az))?;
        Ok(Body::new(
            BodyRole::Satellite,
            map,
            params.r,
            params.luminosity,
            0.0,
            params.prot,
            params.theta0,
            params.elements,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        role: BodyRole,
        map: SurfaceMap,
        r: Meter,
        luminosity: Watt,
        m: Kilogram,
        prot: Second,
        theta0: Radian,
        elements: OrbitalElements,
    ) -> Self {
        let nw = map.nw();
        Body {
            role,
            map,
            r,
            luminosity,
            m,
            prot,
            theta0,
            elements,
            a: 0.0,
            eps: KEPLER_EPS,
            maxiter: KEPLER_MAXITER,
            kepler_error: None,
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
            flux: DMatrix::zeros(0, nw),
        }
    }

    pub fn role(&self) -> BodyRole {
        self.role
    }

    pub fn map(&self) -> &SurfaceMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut SurfaceMap {
        &mut self.map
    }

    pub fn radius(&self) -> Meter {
        self.r
    }

    pub fn luminosity(&self) -> Watt {
        self.luminosity
    }

    pub fn mass(&self) -> Kilogram {
        self.m
    }

    pub fn elements(&self) -> &OrbitalElements {
        &self.elements
    }

    /// Semi-major axis, set when the body joins a [`System`].
    pub fn semi_major_axis(&self) -> Meter {
        self.a
    }

    /// First Kepler non-convergence met by this body; stays set until
    /// [`Body::clear_kepler_error`].
    pub fn kepler_error(&self) -> Option<&OccultError> {
        self.kepler_error.as_ref()
    }

    pub fn clear_kepler_error(&mut self) {
        self.kepler_error = None;
    }

    /// `x` positions (m) at the epochs of the last compute.
    pub fn x(&self) -> &[Meter] {
        &self.x
    }

    pub fn y(&self) -> &[Meter] {
        &self.y
    }

    /// Positions along the line of sight; larger is closer to the observer.
    pub fn z(&self) -> &[Meter] {
        &self.z
    }

    /// Flux at the epochs of the last compute, one row per epoch and one column per channel.
    pub fn flux(&self) -> &DMatrix<f64> {
        &self.flux
    }

    /// Rotational phase at time `t`.
    pub fn theta(&self, t: Second) -> Radian {
        if self.prot == 0.0 || self.prot.is_infinite() {
            self.theta0
        } else {
            (self.theta0 + DPI / self.prot * (t - self.elements.tref)).rem_euclid(DPI)
        }
    }

    /// Position at time `t` together with the Kepler solution it came from.
    ///
    /// Return
    /// ----
    /// * `(position, solution)`; the primary is always at the origin with a trivial solution.
    ///   An unconverged solution still yields the position of its last iterate.
    pub fn step(&self, t: Second) -> (Vector3<Meter>, KeplerSolution) {
        let el = &self.elements;
        if self.role == BodyRole::Primary {
            let at_rest = KeplerSolution {
                eccentric_anomaly: 0.0,
                iterations: 0,
                residual: 0.0,
                converged: true,
            };
            return (Vector3::zeros(), at_rest);
        }

        let m0 = el.lambda0 - el.omega - el.w;
        let mean_anomaly = principal_angle(m0 + DPI / el.porb * (t - el.tref));
        let solution = solve_kepler(mean_anomaly, el.ecc, self.eps, self.maxiter);
        let f = true_anomaly(solution.eccentric_anomaly, el.ecc);
        let rorb = self.a * (1.0 - el.ecc * el.ecc) / (1.0 + el.ecc * f.cos());

        // Murray & Dermott, eq. 2.122
        let (sin_o, cos_o) = el.omega.sin_cos();
        let (sin_i, cos_i) = el.inc.sin_cos();
        let (swf, cwf) = (el.w + f).sin_cos();
        let position = Vector3::new(
            rorb * (cos_o * cwf - sin_o * cos_i * swf),
            rorb * (sin_o * cwf + cos_o * cos_i * swf),
            rorb * swf * sin_i,
        );
        (position, solution)
    }

    /// Flux of this body at time `t`, occulted by a disk of radius `ro` at `(xo, yo)`
    /// (in units of this body's radius). `ro = 0` gives the unocculted flux.
    pub fn flux_at(&self, rot: &mut Wigner, t: Second, xo: f64, yo: f64, ro: f64) -> DVector<f64> {
        self.map.flux_with(rot, self.theta(t), xo, yo, ro) * self.luminosity
    }
}

/// Per-epoch results gathered from the workers.
struct EpochState {
    positions: Vec<Vector3<Meter>>,
    fluxes: Vec<DVector<f64>>,
    failures: Vec<Option<KeplerSolution>>,
}

/// A primary and its satellites.
#[derive(Debug, Clone)]
pub struct System {
    bodies: Vec<Body>,
    settings: SystemSettings,
    flux: DMatrix<f64>,
}

impl System {
    /// Assemble a system, assigning roles and deriving every satellite's semi-major axis
    /// `a = (G·M·porb² / 4π²)^(1/3)` from the primary mass `M`.
    ///
    /// Arguments
    /// ---------
    /// * `primary` – body fixed at the origin.
    /// * `satellites` – bodies orbiting the primary.
    /// * `settings` – Kepler solver settings, propagated to every satellite.
    ///
    /// Return
    /// ----
    /// * [`OccultError::InvalidSystem`] when the maps do not share one channel count, a radius
    ///   is not positive or a satellite period is not finite and positive.
    pub fn new(
        primary: Body,
        satellites: Vec<Body>,
        settings: SystemSettings,
    ) -> Result<Self, OccultError> {
        let nw = primary.map.nw();
        let mut bodies = Vec::with_capacity(satellites.len() + 1);

        let mut primary = primary;
        primary.role = BodyRole::Primary;
        primary.a = 0.0;
        let gm = BIGG * primary.m;
        bodies.push(primary);

        for (i, mut body) in satellites.into_iter().enumerate() {
            let porb = body.elements.porb;
            if !(porb.is_finite() && porb > 0.0) {
                return Err(OccultError::InvalidSystem(format!(
                    "satellite {i} has orbital period {porb}"
                )));
            }
            body.role = BodyRole::Satellite;
            body.eps = settings.eps;
            body.maxiter = settings.maxiter;
            body.a = (porb * porb * gm / (4.0 * std::f64::consts::PI.powi(2))).cbrt();
            debug!("satellite {i}: porb = {porb} s, a = {:.6e} m", body.a);
            bodies.push(body);
        }

        let system = System {
            bodies,
            settings,
            flux: DMatrix::zeros(0, nw),
        };
        system.validate()?;
        Ok(system)
    }

    /// Check that every body shares the primary's channel count and has a positive radius.
    fn validate(&self) -> Result<usize, OccultError> {
        let nw = self.bodies[0].map.nw();
        for (i, body) in self.bodies.iter().enumerate() {
            if body.map.nw() != nw {
                return Err(OccultError::InvalidSystem(format!(
                    "body {i} has {} wavelength channels, the primary has {nw}",
                    body.map.nw()
                )));
            }
            if !(body.r > 0.0) {
                return Err(OccultError::InvalidSystem(format!(
                    "body {i} has radius {}",
                    body.r
                )));
            }
        }
        Ok(nw)
    }

    /// Bodies, the primary first.
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    pub fn settings(&self) -> &SystemSettings {
        &self.settings
    }

    /// Total flux of the last compute, one row per epoch and one column per channel.
    pub fn flux(&self) -> &DMatrix<f64> {
        &self.flux
    }

    /// Positions and fluxes of every body at one epoch.
    fn epoch(&self, scratch: &mut [Wigner], t: Second) -> EpochState {
        let (positions, solutions): (Vec<_>, Vec<_>) =
            self.bodies.iter().map(|body| body.step(t)).unzip();

        let mut fluxes: Vec<Option<DVector<f64>>> = vec![None; self.bodies.len()];
        for (i, j) in (0..self.bodies.len()).tuple_combinations() {
            let (o, p) = if positions[j].z > positions[i].z {
                (j, i)
            } else {
                (i, j)
            };
            let occulted = &self.bodies[p];
            let xo = (positions[o].x - positions[p].x) / occulted.r;
            let yo = (positions[o].y - positions[p].y) / occulted.r;
            let ro = self.bodies[o].r / occulted.r;
            if (xo * xo + yo * yo).sqrt() < 1.0 + ro {
                fluxes[p] = Some(occulted.flux_at(&mut scratch[p], t, xo, yo, ro));
            }
        }

        let fluxes = fluxes
            .into_iter()
            .zip(self.bodies.iter().zip(scratch.iter_mut()))
            .map(|(flux, (body, rot))| flux.unwrap_or_else(|| body.flux_at(rot, t, 0.0, 0.0, 0.0)))
            .collect();
        let failures = solutions
            .into_iter()
            .map(|s| (!s.converged).then_some(s))
            .collect();

        EpochState {
            positions,
            fluxes,
            failures,
        }
    }

    /// Compute positions and fluxes of every body over `time`, and the total flux.
    ///
    /// Arguments
    /// ---------
    /// * `time` – strictly increasing epochs, in the units of `porb`, `prot` and `tref`.
    ///
    /// Return
    /// ----
    /// * [`OccultError::InvalidSystem`] when a map was replaced through
    ///   [`System::bodies_mut`] with one of another channel count. Nothing is computed then.
    ///
    /// Kepler non-convergence does not stop the computation: the last iterate is used, the
    /// body's [`Body::kepler_error`] is set and a warning is logged once per body.
    pub fn compute(&mut self, time: &[Second]) -> Result<(), OccultError> {
        let nt = time.len();
        let nw = self.validate()?;
        debug!("computing {nt} epochs for {} bodies", self.bodies.len());

        let states: Vec<EpochState> = time
            .par_iter()
            .map_init(
                || {
                    self.bodies
                        .iter()
                        .map(|body| body.map.rotation_state())
                        .collect::<Vec<_>>()
                },
                |scratch, &t| self.epoch(scratch, t),
            )
            .collect();

        self.flux = DMatrix::zeros(nt, nw);
        for (k, body) in self.bodies.iter_mut().enumerate() {
            body.x = states.iter().map(|s| s.positions[k].x).collect();
            body.y = states.iter().map(|s| s.positions[k].y).collect();
            body.z = states.iter().map(|s| s.positions[k].z).collect();
            body.flux = DMatrix::zeros(nt, nw);
            for (t, state) in states.iter().enumerate() {
                body.flux.set_row(t, &state.fluxes[k].transpose());
            }
            self.flux += &body.flux;

            let failures: Vec<KeplerSolution> =
                states.iter().filter_map(|s| s.failures[k]).collect();
            if let Some(first) = failures.first() {
                warn!(
                    "body {k}: Kepler solver did not converge at {} of {nt} epochs \
                     (first residual {:e} after {} iterations)",
                    failures.len(),
                    first.residual,
                    first.iterations
                );
                if body.kepler_error.is_none() {
                    body.kepler_error = first.into_result().err();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod orbital_test {
    use super::*;
    use crate::constants::{MSUN, RSUN};
    use approx::assert_relative_eq;

    fn star() -> Body {
        Body::star(RSUN, LSUN, MSUN).unwrap()
    }

    #[test]
    fn test_semi_major_axis() {
        let planet = Body::planet(&PlanetParams::default()).unwrap();
        let system = System::new(star(), vec![planet], SystemSettings::default()).unwrap();
        let a = system.bodies()[1].semi_major_axis();
        let expected = (DAY * DAY * BIGG * MSUN / (4.0 * std::f64::consts::PI.powi(2))).cbrt();
        assert_relative_eq!(a, expected, max_relative = 1e-14);
        assert_eq!(system.bodies()[0].role(), BodyRole::Primary);
        assert_eq!(system.bodies()[1].role(), BodyRole::Satellite);
    }

    #[test]
    fn test_invalid_system() {
        let two_channels = {
            let mut body = Body::planet(&PlanetParams::default()).unwrap();
            *body.map_mut() = SurfaceMap::with_channels(2, 2).unwrap();
            body
        };
        assert!(matches!(
            System::new(star(), vec![two_channels], SystemSettings::default()),
            Err(OccultError::InvalidSystem(_))
        ));
        assert!(matches!(
            System::new(star(), vec![star()], SystemSettings::default()),
            Err(OccultError::InvalidSystem(_))
        ));
    }

    #[test]
    fn test_replaced_map_is_rejected_by_compute() {
        let planet = Body::planet(&PlanetParams::default()).unwrap();
        let mut system = System::new(star(), vec![planet], SystemSettings::default()).unwrap();
        system.compute(&[0.0, 1.0]).unwrap();
        let before = system.flux().clone();

        *system.bodies_mut()[1].map_mut() = SurfaceMap::with_channels(2, 3).unwrap();
        assert!(matches!(
            system.compute(&[0.0, 1.0, 2.0]),
            Err(OccultError::InvalidSystem(_))
        ));
        assert_eq!(system.flux(), &before);

        *system.bodies_mut()[1].map_mut() = SurfaceMap::new(3).unwrap();
        system.compute(&[0.0, 1.0, 2.0]).unwrap();
        assert_eq!(system.flux().shape(), (3, 1));
    }

    #[test]
    fn test_circular_orbit_positions() {
        let params = PlanetParams {
            elements: OrbitalElements {
                lambda0: FRAC_PI_2,
                ..OrbitalElements::default()
            },
            ..PlanetParams::default()
        };
        let system =
            System::new(star(), vec![Body::planet(&params).unwrap()], SystemSettings::default())
                .unwrap();
        let planet = &system.bodies()[1];
        let a = planet.semi_major_axis();

        // edge-on: transit at tref, in front of the star
        let (p0, sol) = planet.step(0.0);
        assert_eq!(sol.iterations, 0);
        assert_relative_eq!(p0.x, 0.0, epsilon = 1e-6 * a);
        assert_relative_eq!(p0.z, a, max_relative = 1e-12);
        assert_relative_eq!(p0.y, 0.0, epsilon = 1e-6 * a);

        // half a period later it is behind the star
        let (p1, _) = planet.step(0.5 * DAY);
        assert_relative_eq!(p1.z, -a, max_relative = 1e-12);
        assert_relative_eq!(p1.norm(), a, max_relative = 1e-12);
    }

    #[test]
    fn test_eccentric_orbit_radius() {
        let params = PlanetParams {
            elements: OrbitalElements {
                ecc: 0.4,
                w: 0.3,
                omega: 1.1,
                inc: 1.2,
                ..OrbitalElements::default()
            },
            ..PlanetParams::default()
        };
        let system =
            System::new(star(), vec![Body::planet(&params).unwrap()], SystemSettings::default())
                .unwrap();
        let planet = &system.bodies()[1];
        let a = planet.semi_major_axis();
        let radii: Vec<f64> = (0..200)
            .map(|k| planet.step(k as f64 * DAY / 200.0).0.norm())
            .collect();
        let rmin = radii.iter().cloned().fold(f64::INFINITY, f64::min);
        let rmax = radii.iter().cloned().fold(0.0, f64::max);
        assert_relative_eq!(rmin, a * 0.6, max_relative = 1e-3);
        assert_relative_eq!(rmax, a * 1.4, max_relative = 1e-3);
    }

    #[test]
    fn test_theta() {
        let star = star();
        assert_eq!(star.theta(123.0), 0.0);

        let params = PlanetParams {
            theta0: 0.5,
            prot: 10.0,
            ..PlanetParams::default()
        };
        let planet = Body::planet(&params).unwrap();
        assert_relative_eq!(planet.theta(2.5), 0.5 + DPI / 4.0, epsilon = 1e-14);
        assert_relative_eq!(planet.theta(12.5), 0.5 + DPI / 4.0, epsilon = 1e-12);
        let still = Body::planet(&PlanetParams {
            prot: 0.0,
            theta0: 0.2,
            ..PlanetParams::default()
        })
        .unwrap();
        assert_eq!(still.theta(1e5), 0.2);
    }

    #[test]
    fn test_aggregate_is_sum_of_bodies() {
        let mut planet = Body::planet(&PlanetParams::default()).unwrap();
        planet.map_mut().set_coefficient(0, 0, 1.0).unwrap();
        let mut system = System::new(star(), vec![planet], SystemSettings::default()).unwrap();
        let time: Vec<f64> = (0..500).map(|i| i as f64 * DAY / 250.0).collect();
        system.compute(&time).unwrap();

        let sum = system.bodies()[0].flux() + system.bodies()[1].flux();
        assert_eq!(system.flux(), &sum);
        assert_eq!(system.bodies()[1].x().len(), 500);
    }

    #[test]
    fn test_kepler_flag_is_sticky() {
        let params = PlanetParams {
            elements: OrbitalElements {
                ecc: 0.9,
                ..OrbitalElements::default()
            },
            ..PlanetParams::default()
        };
        let settings = SystemSettings {
            eps: 0.0,
            maxiter: 1,
        };
        let mut system =
            System::new(star(), vec![Body::planet(&params).unwrap()], settings).unwrap();
        system.compute(&[0.1 * DAY, 0.3 * DAY]).unwrap();
        assert!(matches!(
            system.bodies()[1].kepler_error(),
            Some(OccultError::KeplerNonConvergence { iterations: 1, .. })
        ));
        assert!(system.bodies()[0].kepler_error().is_none());
        assert!(system.flux().iter().all(|f| f.is_finite()));

        system.bodies_mut()[1].clear_kepler_error();
        assert!(system.bodies()[1].kepler_error().is_none());
    }
}
