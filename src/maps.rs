//! # Surface maps
//!
//! A [`SurfaceMap`] is the surface intensity of one body written as a finite expansion in
//! real spherical harmonics `Y_{l,m}`, `l ≤ lmax`. The map may carry several wavelength
//! channels: coefficients are stored as an `N × NW` matrix with one column per channel.
//!
//! The map keeps its polynomial (`p = A1·y`) and Green's (`g = A·y`) representations in
//! sync with the harmonic coefficients: every setter validates its input first, mutates,
//! then calls [`SurfaceMap::update`]. A failed call leaves the map untouched.
//!
//! ## Evaluation
//!
//! * [`SurfaceMap::evaluate`] – intensity at a point `(x, y)` of the projected disk after
//!   rotating the map by `θ` about its axis; `NaN` outside the disk.
//! * [`SurfaceMap::flux`] – disk-integrated flux when an occultor of radius `ro` sits at
//!   `(xo, yo)`, in units of the body's radius.
//!
//! Both come with a gradient variant returning a [`Gradient`] whose rows follow the order
//! geometric parameters first, then one row per coefficient in increasing `n = l² + l + m`.
//!
//! Evaluation never mutates the map. The rotation blocks live in a [`Wigner`] scratch
//! buffer: the plain entry points build a temporary one, the `*_with` variants reuse a
//! caller-owned buffer from [`SurfaceMap::rotation_state`] (one per worker thread).
//!
//! ## Example
//!
//! ```rust
//! use occult::maps::SurfaceMap;
//!
//! let mut map = SurfaceMap::new(2).unwrap();
//! map.set_coefficient(0, 0, 1.0).unwrap();
//! map.set_coefficient(1, 0, 0.5).unwrap();
//! assert_eq!(map.to_string(), "<Map: Y_{0,0} + 0.50 Y_{1,0}>");
//!
//! // a small occultor crossing the centre of the disk
//! let full = map.flux(0.0, 5.0, 5.0, 0.1)[0];
//! let dimmed = map.flux(0.0, 0.0, 0.0, 0.1)[0];
//! assert!(dimmed < full);
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use log::warn;
use nalgebra::{DMatrix, DVector, RowDVector, Vector3};

use crate::autodiff::Dual;
use crate::basis::{lm_index, n_coeffs, polynomial_basis, BasisTransforms};
use crate::constants::COEFF_TOL;
use crate::occult_errors::OccultError;
use crate::rotation::Wigner;
use crate::solver::{significant_terms, solution_vector, Geometry};

/// Derivatives of an intensity or a flux, one row per parameter and one column per
/// wavelength channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    names: Vec<String>,
    values: DMatrix<f64>,
}

impl Gradient {
    /// Parameter names, in row order: `theta`, the geometric parameters, then `Y_{l,m}`.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// Derivative with respect to `name`, one entry per channel.
    pub fn get(&self, name: &str) -> Option<DVector<f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|row| self.values.row(row).transpose())
    }
}

/// Spherical-harmonic surface map of one body.
#[derive(Debug, Clone)]
pub struct SurfaceMap {
    lmax: usize,
    nw: usize,
    basis: Arc<BasisTransforms>,
    y: DMatrix<f64>,
    p: DMatrix<f64>,
    g: DMatrix<f64>,
    axis: Vector3<f64>,
}

impl SurfaceMap {
    /// Single-channel map of degree `lmax`, all coefficients zero, axis `ŷ`.
    pub fn new(lmax: usize) -> Result<Self, OccultError> {
        Self::with_channels(lmax, 1)
    }

    /// Map with `nw` wavelength channels.
    pub fn with_channels(lmax: usize, nw: usize) -> Result<Self, OccultError> {
        Ok(Self::with_basis(BasisTransforms::shared(lmax)?, nw))
    }

    /// Map sharing already-built operators with other maps of the same degree.
    ///
    /// Arguments
    /// ---------
    /// * `basis` – operators for the map degree; `lmax` is taken from them.
    /// * `nw` – number of wavelength channels, at least one.
    pub fn with_basis(basis: Arc<BasisTransforms>, nw: usize) -> Self {
        let lmax = basis.lmax();
        let n = n_coeffs(lmax);
        let nw = nw.max(1);
        SurfaceMap {
            lmax,
            nw,
            basis,
            y: DMatrix::zeros(n, nw),
            p: DMatrix::zeros(n, nw),
            g: DMatrix::zeros(n, nw),
            axis: Vector3::y(),
        }
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Number of coefficients per channel.
    pub fn n(&self) -> usize {
        n_coeffs(self.lmax)
    }

    /// Number of wavelength channels.
    pub fn nw(&self) -> usize {
        self.nw
    }

    pub fn basis(&self) -> &Arc<BasisTransforms> {
        &self.basis
    }

    fn index(&self, l: usize, m: i32) -> Result<usize, OccultError> {
        if l > self.lmax || m.unsigned_abs() as usize > l {
            return Err(OccultError::InvalidIndex {
                l: l as i32,
                m,
                lmax: self.lmax,
            });
        }
        Ok(lm_index(l, m))
    }

    /// Coefficient of `Y_{l,m}` in the first channel.
    pub fn coefficient(&self, l: usize, m: i32) -> Result<f64, OccultError> {
        Ok(self.y[(self.index(l, m)?, 0)])
    }

    /// Coefficient of `Y_{l,m}` in every channel.
    pub fn coefficient_channels(&self, l: usize, m: i32) -> Result<DVector<f64>, OccultError> {
        Ok(self.y.row(self.index(l, m)?).transpose())
    }

    /// Set the coefficient of `Y_{l,m}` to `value` in every channel.
    pub fn set_coefficient(&mut self, l: usize, m: i32, value: f64) -> Result<(), OccultError> {
        let n = self.index(l, m)?;
        self.y.row_mut(n).fill(value);
        self.update();
        Ok(())
    }

    /// Set the coefficient of `Y_{l,m}` channel by channel.
    pub fn set_coefficient_channels(
        &mut self,
        l: usize,
        m: i32,
        values: &[f64],
    ) -> Result<(), OccultError> {
        let n = self.index(l, m)?;
        if values.len() != self.nw {
            return Err(OccultError::ChannelMismatch {
                expected: self.nw,
                found: values.len(),
            });
        }
        for (ch, v) in values.iter().enumerate() {
            self.y[(n, ch)] = *v;
        }
        self.update();
        Ok(())
    }

    /// Replace every coefficient at once from an `N × NW` matrix.
    pub fn set_coefficients(&mut self, y: &DMatrix<f64>) -> Result<(), OccultError> {
        let expected = (self.n(), self.nw);
        if y.shape() != expected {
            return Err(OccultError::ShapeMismatch {
                expected,
                found: y.shape(),
            });
        }
        self.y.copy_from(y);
        self.update();
        Ok(())
    }

    /// Spherical-harmonic coefficients, `N × NW`.
    pub fn coefficients(&self) -> &DMatrix<f64> {
        &self.y
    }

    /// Polynomial-basis coefficients `A1·y`.
    pub fn polynomial(&self) -> &DMatrix<f64> {
        &self.p
    }

    /// Green's-basis coefficients `A·y`.
    pub fn greens(&self) -> &DMatrix<f64> {
        &self.g
    }

    /// Unit rotation axis.
    pub fn axis(&self) -> &Vector3<f64> {
        &self.axis
    }

    /// Set the rotation axis; it is normalised to unit length.
    pub fn set_axis(&mut self, axis: Vector3<f64>) -> Result<(), OccultError> {
        let norm = axis.norm();
        if norm == 0.0 || !norm.is_finite() {
            return Err(OccultError::ZeroAxis);
        }
        self.axis = axis / norm;
        Ok(())
    }

    /// Recompute the derived bases from `y`.
    pub fn update(&mut self) {
        self.p = self.basis.a1() * &self.y;
        self.g = self.basis.a() * &self.y;
    }

    /// Zero every coefficient and restore the default axis `ŷ`.
    pub fn reset(&mut self) {
        self.y.fill(0.0);
        self.axis = Vector3::y();
        self.update();
    }

    /// Rotate the stored map in place by `theta` about its axis.
    pub fn rotate(&mut self, theta: f64) {
        let mut rot = self.rotation_state();
        let mut out = DMatrix::zeros(self.n(), self.nw);
        rot.rotate(theta.cos(), theta.sin(), &self.y, &mut out);
        self.y = out;
        self.update();
    }

    /// Replace the map by a radially symmetric limb-darkened profile
    /// `I(μ) ∝ 1 − Σ_k u_k (1 − μ)^k`, normalised to unit disk-integrated flux.
    ///
    /// Arguments
    /// ---------
    /// * `u` – coefficients `u_1 … u_K` with `K ≤ lmax`.
    ///
    /// Return
    /// ----
    /// * [`OccultError::DegreeOutOfRange`] when more than `lmax` coefficients are given.
    pub fn limb_darken(&mut self, u: &[f64]) -> Result<(), OccultError> {
        if u.len() > self.lmax {
            return Err(OccultError::DegreeOutOfRange {
                degree: u.len(),
                lmax: self.lmax,
            });
        }
        let mut coeffs = DVector::zeros(self.lmax + 1);
        coeffs[0] = 1.0;
        for (k, uk) in u.iter().enumerate() {
            coeffs[k + 1] = *uk;
        }

        let mut y = self.basis.u() * coeffs;
        let total = (self.basis.rta1() * &y)[0];
        if total != 0.0 && total.is_finite() {
            y /= total;
        } else {
            warn!("limb-darkened profile has zero total flux, left unnormalised (u = {u:?})");
        }
        for ch in 0..self.nw {
            self.y.set_column(ch, &y);
        }
        self.update();
        Ok(())
    }

    /// Fresh rotation scratch buffer for this map's degree and axis.
    pub fn rotation_state(&self) -> Wigner {
        Wigner::with_unit_axis(self.lmax, self.axis)
    }

    fn sync(&self, rot: &mut Wigner) {
        if rot.lmax() != self.lmax {
            *rot = self.rotation_state();
        } else if rot.axis() != &self.axis {
            rot.align_axis(&self.axis);
        }
    }

    /// `R(θ)·y`, borrowing `y` itself when no rotation is needed.
    fn rotated<'a>(&'a self, rot: &mut Wigner, theta: f64) -> Cow<'a, DMatrix<f64>> {
        if theta == 0.0 {
            return Cow::Borrowed(&self.y);
        }
        self.sync(rot);
        let mut out = DMatrix::zeros(self.n(), self.nw);
        rot.rotate(theta.cos(), theta.sin(), &self.y, &mut out);
        Cow::Owned(out)
    }

    fn gradient_names(&self, geometric: &[&str]) -> Vec<String> {
        let mut names: Vec<String> = geometric.iter().map(|s| s.to_string()).collect();
        for l in 0..=self.lmax {
            for m in -(l as i32)..=(l as i32) {
                names.push(format!("Y_{{{l},{m}}}"));
            }
        }
        names
    }

    /// Intensity at `(x, y)` on the projected disk, map rotated by `theta`.
    ///
    /// Return
    /// ----
    /// * One value per channel, `NaN` everywhere when `x² + y² > 1`.
    pub fn evaluate(&self, theta: f64, x: f64, y: f64) -> DVector<f64> {
        let mut rot = self.rotation_state();
        self.evaluate_with(&mut rot, theta, x, y)
    }

    /// [`SurfaceMap::evaluate`] reusing a caller-owned rotation buffer.
    pub fn evaluate_with(&self, rot: &mut Wigner, theta: f64, x: f64, y: f64) -> DVector<f64> {
        if x * x + y * y > 1.0 {
            return DVector::from_element(self.nw, f64::NAN);
        }
        let terms = RowDVector::from_vec(polynomial_basis(self.lmax, x, y));
        let intensity = if theta == 0.0 {
            &terms * &self.p
        } else {
            let ry = self.rotated(rot, theta);
            &terms * (self.basis.a1() * &*ry)
        };
        intensity.transpose()
    }

    /// Intensity and its derivatives with respect to `theta`, `x`, `y` and every coefficient.
    pub fn evaluate_with_gradient(&self, theta: f64, x: f64, y: f64) -> (DVector<f64>, Gradient) {
        let mut rot = self.rotation_state();
        self.evaluate_gradient_with(&mut rot, theta, x, y)
    }

    /// [`SurfaceMap::evaluate_with_gradient`] reusing a caller-owned rotation buffer.
    pub fn evaluate_gradient_with(
        &self,
        rot: &mut Wigner,
        theta: f64,
        x: f64,
        y: f64,
    ) -> (DVector<f64>, Gradient) {
        let (n, nw) = (self.n(), self.nw);
        let names = self.gradient_names(&["theta", "x", "y"]);
        if x * x + y * y > 1.0 {
            let values = DMatrix::from_element(3 + n, nw, f64::NAN);
            return (DVector::from_element(nw, f64::NAN), Gradient { names, values });
        }

        self.sync(rot);
        rot.compute(theta.cos(), theta.sin());
        let mut ry = DMatrix::zeros(n, nw);
        let mut dry = DMatrix::zeros(n, nw);
        rot.apply(&self.y, &mut ry);
        rot.apply_derivative(&self.y, &mut dry);

        let terms = polynomial_basis(self.lmax, Dual::<2>::variable(x, 0), Dual::variable(y, 1));
        let pv = RowDVector::from_iterator(n, terms.iter().map(|t| t.val));
        let px = RowDVector::from_iterator(n, terms.iter().map(|t| t.grad[0]));
        let py = RowDVector::from_iterator(n, terms.iter().map(|t| t.grad[1]));

        let a1 = self.basis.a1();
        let a1ry = a1 * &ry;
        let mut values = DMatrix::zeros(3 + n, nw);
        values.row_mut(0).copy_from(&(&pv * (a1 * &dry)));
        values.row_mut(1).copy_from(&(&px * &a1ry));
        values.row_mut(2).copy_from(&(&py * &a1ry));
        let dy = rot.apply_transpose(&(&pv * a1));
        for (i, d) in dy.iter().enumerate() {
            values.row_mut(3 + i).fill(*d);
        }

        ((&pv * &a1ry).transpose(), Gradient { names, values })
    }

    /// Disk-integrated flux with an occultor of radius `ro` at `(xo, yo)`, map rotated by
    /// `theta`. Lengths are in units of this body's radius.
    pub fn flux(&self, theta: f64, xo: f64, yo: f64, ro: f64) -> DVector<f64> {
        let mut rot = self.rotation_state();
        self.flux_with(&mut rot, theta, xo, yo, ro)
    }

    /// [`SurfaceMap::flux`] reusing a caller-owned rotation buffer.
    pub fn flux_with(
        &self,
        rot: &mut Wigner,
        theta: f64,
        xo: f64,
        yo: f64,
        ro: f64,
    ) -> DVector<f64> {
        let b = (xo * xo + yo * yo).sqrt();
        match Geometry::classify(b, ro) {
            Geometry::Total => DVector::zeros(self.nw),
            Geometry::Unocculted => {
                let ry = self.rotated(rot, theta);
                (self.basis.rta1() * &*ry).transpose()
            }
            Geometry::Partial => {
                let g = if theta == 0.0 && xo == 0.0 && yo >= 0.0 {
                    // occultor already on +y, nothing to rotate
                    Cow::Borrowed(&self.g)
                } else {
                    let ry = self.rotated(rot, theta);
                    self.sync(rot);
                    let (cos_a, sin_a) = alignment(xo, yo, b);
                    let mut rz = DMatrix::zeros(self.n(), self.nw);
                    rot.rotatez(cos_a, sin_a, &*ry, &mut rz);
                    Cow::Owned(self.basis.a() * rz)
                };
                let mask = significant_terms(&g);
                let st = RowDVector::from_vec(solution_vector(self.lmax, b, ro, Some(&mask)));
                (st * &*g).transpose()
            }
        }
    }

    /// Flux and its derivatives with respect to `theta`, `xo`, `yo`, `ro` and every
    /// coefficient.
    pub fn flux_with_gradient(
        &self,
        theta: f64,
        xo: f64,
        yo: f64,
        ro: f64,
    ) -> (DVector<f64>, Gradient) {
        let mut rot = self.rotation_state();
        self.flux_gradient_with(&mut rot, theta, xo, yo, ro)
    }

    /// [`SurfaceMap::flux_with_gradient`] reusing a caller-owned rotation buffer.
    pub fn flux_gradient_with(
        &self,
        rot: &mut Wigner,
        theta: f64,
        xo: f64,
        yo: f64,
        ro: f64,
    ) -> (DVector<f64>, Gradient) {
        let (n, nw) = (self.n(), self.nw);
        let names = self.gradient_names(&["theta", "xo", "yo", "ro"]);
        let mut values = DMatrix::zeros(4 + n, nw);

        let b = (xo * xo + yo * yo).sqrt();
        let geometry = Geometry::classify(b, ro);
        if geometry == Geometry::Total {
            return (DVector::zeros(nw), Gradient { names, values });
        }

        self.sync(rot);
        rot.compute(theta.cos(), theta.sin());
        let mut ry = DMatrix::zeros(n, nw);
        let mut dry = DMatrix::zeros(n, nw);
        rot.apply(&self.y, &mut ry);
        rot.apply_derivative(&self.y, &mut dry);

        if geometry == Geometry::Unocculted {
            let rta1 = self.basis.rta1();
            values.row_mut(0).copy_from(&(rta1 * &dry));
            for (i, d) in rot.apply_transpose(rta1).iter().enumerate() {
                values.row_mut(4 + i).fill(*d);
            }
            return ((rta1 * &ry).transpose(), Gradient { names, values });
        }

        let (cos_a, sin_a) = alignment(xo, yo, b);
        let mut rzry = DMatrix::zeros(n, nw);
        let mut drz = DMatrix::zeros(n, nw);
        rot.rotatez(cos_a, sin_a, &ry, &mut rzry);
        rot.rotatez_derivative(&ry, &mut drz);

        let s = solution_vector(
            self.lmax,
            Dual::<2>::variable(b, 0),
            Dual::variable(ro, 1),
            None,
        );
        let a = self.basis.a();
        let sta = RowDVector::from_iterator(n, s.iter().map(|v| v.val)) * a;
        let dsdb = RowDVector::from_iterator(n, s.iter().map(|v| v.grad[0])) * a;
        let dsdr = RowDVector::from_iterator(n, s.iter().map(|v| v.grad[1])) * a;

        let df_db = &dsdb * &rzry;
        let df_dalpha = &sta * &drz;
        let weights = rot.rotatez_transpose(&sta);

        values.row_mut(0).copy_from(&(&weights * &dry));
        if b > 0.0 {
            let (xo_b, yo_b) = (xo / b, yo / b);
            values
                .row_mut(1)
                .copy_from(&(&df_db * xo_b + &df_dalpha * (yo_b / b)));
            values
                .row_mut(2)
                .copy_from(&(&df_db * yo_b - &df_dalpha * (xo_b / b)));
        } else {
            // direction undefined at b = 0: take the occultor as lying on +y
            values.row_mut(2).copy_from(&df_db);
        }
        values.row_mut(3).copy_from(&(&dsdr * &rzry));
        for (i, d) in rot.apply_transpose(&weights).iter().enumerate() {
            values.row_mut(4 + i).fill(*d);
        }

        ((&sta * &rzry).transpose(), Gradient { names, values })
    }
}

/// `(cos α, sin α)` of the z rotation that brings `(xo, yo)` onto `(0, b)`.
fn alignment(xo: f64, yo: f64, b: f64) -> (f64, f64) {
    if b > 0.0 {
        (yo / b, xo / b)
    } else {
        (1.0, 0.0)
    }
}

impl fmt::Display for SurfaceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        let mut nterms = 0;
        for l in 0..=self.lmax {
            for m in -(l as i32)..=(l as i32) {
                let v = self.y[(lm_index(l, m), 0)];
                if v.abs() <= COEFF_TOL {
                    continue;
                }
                out.push_str(match (nterms > 0, v > 0.0) {
                    (true, true) => " + ",
                    (true, false) => " - ",
                    (false, false) => "-",
                    (false, true) => "",
                });
                let mag = v.abs();
                let term = format!("Y_{{{l},{m}}}");
                if mag == 1.0 {
                    out.push_str(&term);
                } else if mag.fract() < COEFF_TOL {
                    out.push_str(&format!("{} {term}", mag as i64));
                } else if mag.fract() >= 0.01 {
                    out.push_str(&format!("{mag:.2} {term}"));
                } else {
                    out.push_str(&format!("{mag:.2e} {term}"));
                }
                nterms += 1;
            }
        }
        if nterms == 0 {
            out.push_str("Null");
        }
        write!(f, "<Map: {out}>")
    }
}
