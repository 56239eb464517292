//! # Change-of-basis operators
//!
//! A surface map lives in three equivalent linear representations:
//!
//! | Basis | Vector | Used for |
//! |---|---|---|
//! | real spherical harmonics `Y_{l,m}` | `y` | storage, rotation |
//! | polynomials `x^i y^j z^k` on the unit disk | `p = A1·y` | intensity evaluation |
//! | Green's basis `g̃_n` | `g = A·y` | occultation integrals |
//!
//! [`BasisTransforms`] holds every constant operator for a given `lmax`. Building it is the
//! expensive part of setting up a map (dense inversions of size `(lmax+1)²`), so one
//! instance is shared through an [`Arc`] by every map of the same degree.
//!
//! ## Index convention
//!
//! Coefficient `(l, m)` sits at `n = l² + l + m`. With `μ = l − m` and `ν = l + m` the
//! polynomial term of index `n` is
//!
//! * `x^{μ/2} y^{ν/2}` when `ν` is even,
//! * `x^{(μ−1)/2} y^{(ν−1)/2} z` when `ν` is odd,
//!
//! where `z = √(1 − x² − y²)` points towards the observer. Powers `z^k` with `k ≥ 2`
//! are always folded back with `z² = 1 − x² − y²`.
//!
//! ## See also
//!
//! - [`crate::solver`] – consumes `A` and `rT`.
//! - [`crate::maps::SurfaceMap`] – keeps `p` and `g` in sync with `y`.

use std::f64::consts::PI;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector, RowDVector};

use crate::autodiff::Scalar;
use crate::occult_errors::OccultError;

/// Number of coefficients of a degree-`lmax` expansion.
#[inline]
pub fn n_coeffs(lmax: usize) -> usize {
    (lmax + 1) * (lmax + 1)
}

/// Flat index of `(l, m)`. The caller guarantees `|m| ≤ l`.
#[inline]
pub fn lm_index(l: usize, m: i32) -> usize {
    ((l * l + l) as i32 + m) as usize
}

/// Inverse of [`lm_index`].
pub fn index_lm(n: usize) -> (usize, i32) {
    let mut l = 0;
    while (l + 1) * (l + 1) <= n {
        l += 1;
    }
    (l, n as i32 - (l * l + l) as i32)
}

/// Exponents `(i, j, k)` of the polynomial term `x^i y^j z^k` stored at index `n`.
pub fn monomial_exponents(n: usize) -> (usize, usize, usize) {
    let (l, m) = index_lm(n);
    let mu = l as i32 - m;
    let nu = l as i32 + m;
    if nu % 2 == 0 {
        ((mu / 2) as usize, (nu / 2) as usize, 0)
    } else {
        (((mu - 1) / 2) as usize, ((nu - 1) / 2) as usize, 1)
    }
}

fn monomial_index(i: usize, j: usize, k: usize) -> usize {
    lm_index(i + j + k, j as i32 - i as i32)
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

fn binomial(n: usize, k: usize) -> f64 {
    factorial(n) / (factorial(k) * factorial(n - k))
}

/// `Γ(n/2)` for a positive integer `n`.
fn gamma_half(n: usize) -> f64 {
    if n % 2 == 0 {
        factorial(n / 2 - 1)
    } else {
        let mut g = PI.sqrt();
        let mut k = 1;
        while k < n {
            g *= k as f64 / 2.0;
            k += 2;
        }
        g
    }
}

/// Accumulate `coeff · x^i y^j z^k` into a polynomial-basis vector.
fn add_monomial(poly: &mut DVector<f64>, coeff: f64, i: usize, j: usize, k: usize) {
    // z^k = z^(k mod 2) · (1 − x² − y²)^(k / 2)
    let q = k / 2;
    for a in 0..=q {
        for b in 0..=(q - a) {
            let c = q - a - b;
            let sign = if (b + c) % 2 == 0 { 1.0 } else { -1.0 };
            let w = factorial(q) / (factorial(a) * factorial(b) * factorial(c));
            poly[monomial_index(i + 2 * b, j + 2 * c, k % 2)] += sign * w * coeff;
        }
    }
}

/// Polynomial-basis expansion of the real spherical harmonic `Y_{l,m}`.
///
/// `Y_{l,m} = N_{l,m} · d^{|m|}P_l/dz^{|m|} · Re((x + iy)^m)` for `m ≥ 0` and
/// `Im((x + iy)^{|m|})` for `m < 0`, orthonormal on the sphere without Condon–Shortley phase.
fn ylm_polynomial(l: usize, m: i32, n: usize) -> DVector<f64> {
    let am = m.unsigned_abs() as usize;
    let delta = if m == 0 { 1.0 } else { 0.0 };
    let norm = ((2.0 - delta) * (2 * l + 1) as f64 * factorial(l - am)
        / (4.0 * PI * factorial(l + am)))
        .sqrt();

    // Legendre P_l, then |m| derivatives
    let mut legendre = vec![0.0; l + 1];
    for k in 0..=l / 2 {
        let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
        legendre[l - 2 * k] =
            sign * binomial(l, k) * binomial(2 * l - 2 * k, l) / 2f64.powi(l as i32);
    }
    let dz: Vec<f64> = (0..=l - am)
        .map(|k| legendre[k + am] * factorial(k + am) / factorial(k))
        .collect();

    let mut poly = DVector::zeros(n);
    for t in 0..=am {
        // i^t selects the real or imaginary part of (x + iy)^|m|
        let sign = match (m >= 0, t % 2) {
            (true, 0) => (-1f64).powi((t / 2) as i32),
            (false, 1) => (-1f64).powi(((t - 1) / 2) as i32),
            _ => continue,
        };
        let cxy = sign * binomial(am, t);
        for (k, c) in dz.iter().enumerate() {
            if *c != 0.0 {
                add_monomial(&mut poly, norm * c * cxy, am - t, t, k);
            }
        }
    }
    poly
}

/// Polynomial-basis expansion of the Green's basis term `g̃_n`.
fn green_polynomial(l: usize, m: i32, n: usize) -> DVector<f64> {
    let mu = l as i32 - m;
    let nu = l as i32 + m;
    let mut poly = DVector::zeros(n);
    let mut put = |c: f64, i: i32, j: i32, k: usize| {
        poly[monomial_index(i as usize, j as usize, k)] += c;
    };
    let li = l as i32;

    if nu % 2 == 0 {
        put(((mu + 2) / 2) as f64, mu / 2, nu / 2, 0);
    } else if l == 1 && m == 0 {
        put(1.0, 0, 0, 1);
    } else if mu == 1 && l % 2 == 0 {
        put(3.0, li - 2, 1, 1);
    } else if mu == 1 {
        put(-1.0, li - 3, 0, 1);
        put(1.0, li - 1, 0, 1);
        put(4.0, li - 3, 2, 1);
    } else {
        let a = (mu - 3) as f64 / 2.0;
        if mu != 3 {
            put(a, (mu - 5) / 2, (nu - 1) / 2, 1);
            put(-a, (mu - 5) / 2, (nu + 3) / 2, 1);
        }
        put(-(mu + 3) as f64 / 2.0, (mu - 1) / 2, (nu - 1) / 2, 1);
    }
    poly
}

/// Integral of each polynomial term over the unit disk.
fn disk_integrals(lmax: usize) -> RowDVector<f64> {
    let n = n_coeffs(lmax);
    RowDVector::from_iterator(
        n,
        (0..n).map(|idx| {
            let (l, m) = index_lm(idx);
            let mu = l as i32 - m;
            let nu = l as i32 + m;
            if mu % 4 == 0 && nu % 4 == 0 {
                let (mu, nu) = (mu as usize, nu as usize);
                gamma_half(mu / 2 + 1) * gamma_half(nu / 2 + 1) / gamma_half((mu + nu) / 2 + 4)
            } else if (mu - 1) % 4 == 0 && (nu - 1) % 4 == 0 {
                let (mu, nu) = (mu as usize, nu as usize);
                0.5 * PI.sqrt() * gamma_half((mu - 1) / 2 + 1) * gamma_half((nu - 1) / 2 + 1)
                    / gamma_half((mu + nu) / 2 + 4)
            } else {
                0.0
            }
        }),
    )
}

/// Constant operators of a degree-`lmax` map.
///
/// Fields
/// ------
/// * `a1` – spherical harmonics → polynomials.
/// * `a1_inv` – polynomials → spherical harmonics.
/// * `a2` – polynomials → Green's basis.
/// * `a` – spherical harmonics → Green's basis, `A2·A1`.
/// * `u` – limb-darkening vector `[1, u1, …, u_lmax]` → spherical harmonics.
/// * `rt` – row vector of disk integrals of the polynomial basis.
/// * `rta1` – `rT·A1`, the unocculted flux of each harmonic.
#[derive(Debug, Clone)]
pub struct BasisTransforms {
    lmax: usize,
    a1: DMatrix<f64>,
    a1_inv: DMatrix<f64>,
    a2: DMatrix<f64>,
    a: DMatrix<f64>,
    u: DMatrix<f64>,
    rt: RowDVector<f64>,
    rta1: RowDVector<f64>,
}

impl BasisTransforms {
    /// Build every operator for degree `lmax`.
    ///
    /// Return
    /// ----
    /// * The operators, or [`OccultError::SingularBasis`] if an inversion fails numerically.
    pub fn new(lmax: usize) -> Result<Self, OccultError> {
        let n = n_coeffs(lmax);

        let mut a1 = DMatrix::zeros(n, n);
        let mut green = DMatrix::zeros(n, n);
        for l in 0..=lmax {
            for m in -(l as i32)..=(l as i32) {
                let col = lm_index(l, m);
                a1.set_column(col, &ylm_polynomial(l, m, n));
                green.set_column(col, &green_polynomial(l, m, n));
            }
        }

        let a1_inv = a1
            .clone()
            .try_inverse()
            .ok_or(OccultError::SingularBasis { lmax })?;
        let a2 = green
            .try_inverse()
            .ok_or(OccultError::SingularBasis { lmax })?;
        let a = &a2 * &a1;

        // I(μ) = 1 − Σ u_k (1 − μ)^k, one column per coefficient
        let mut u_poly = DMatrix::zeros(n, lmax + 1);
        u_poly[(0, 0)] = 1.0;
        for k in 1..=lmax {
            let mut col = DVector::zeros(n);
            for j in 0..=k {
                let sign = if j % 2 == 0 { -1.0 } else { 1.0 };
                add_monomial(&mut col, sign * binomial(k, j), 0, 0, j);
            }
            u_poly.set_column(k, &col);
        }
        let u = &a1_inv * u_poly;

        let rt = disk_integrals(lmax);
        let rta1 = &rt * &a1;

        Ok(BasisTransforms {
            lmax,
            a1,
            a1_inv,
            a2,
            a,
            u,
            rt,
            rta1,
        })
    }

    /// Same as [`BasisTransforms::new`], wrapped for sharing across maps.
    pub fn shared(lmax: usize) -> Result<Arc<Self>, OccultError> {
        Self::new(lmax).map(Arc::new)
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    pub fn n(&self) -> usize {
        n_coeffs(self.lmax)
    }

    pub fn a1(&self) -> &DMatrix<f64> {
        &self.a1
    }

    pub fn a1_inv(&self) -> &DMatrix<f64> {
        &self.a1_inv
    }

    pub fn a2(&self) -> &DMatrix<f64> {
        &self.a2
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn u(&self) -> &DMatrix<f64> {
        &self.u
    }

    pub fn rt(&self) -> &RowDVector<f64> {
        &self.rt
    }

    pub fn rta1(&self) -> &RowDVector<f64> {
        &self.rta1
    }
}

/// Evaluate every polynomial-basis term at `(x, y)` on the unit disk.
///
/// Generic over [`Scalar`]: with [`crate::autodiff::Dual`] inputs the result also carries
/// `∂/∂x` and `∂/∂y` of each term. The caller checks `x² + y² ≤ 1`.
pub fn polynomial_basis<T: Scalar>(lmax: usize, x: T, y: T) -> Vec<T> {
    let z = (T::one() - x * x - y * y).sqrt();

    let mut xp = Vec::with_capacity(lmax + 1);
    let mut yp = Vec::with_capacity(lmax + 1);
    xp.push(T::one());
    yp.push(T::one());
    for k in 1..=lmax {
        xp.push(xp[k - 1] * x);
        yp.push(yp[k - 1] * y);
    }

    (0..n_coeffs(lmax))
        .map(|n| {
            let (i, j, k) = monomial_exponents(n);
            let t = xp[i] * yp[j];
            if k == 1 {
                t * z
            } else {
                t
            }
        })
        .collect()
}
