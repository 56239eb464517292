//! # Wigner rotation of spherical-harmonic maps
//!
//! A rotation by `θ` about a unit axis acts block-diagonally on harmonic coefficients: every
//! degree `l` has its own `(2l+1)×(2l+1)` block `R[l]`. [`Wigner`] builds those blocks with
//! the Ivanic–Ruedenberg recursion, which grows degree `l` from degree `l − 1` and the
//! 3×3 Cartesian rotation matrix. The recursion only uses products and sums of matrix
//! entries, so there is no special case at `θ = 0` or `θ = π`.
//!
//! The angle derivatives `dR[l]/dθ` come for free: the same recursion runs on
//! [`Dual<1>`] numbers seeded with `d(cos θ)/dθ = −sin θ` and `d(sin θ)/dθ = cos θ`.
//!
//! A rotation about the line of sight `z` does not need the full machinery: it only mixes
//! `Y_{l,m}` with `Y_{l,−m}` through `cos(mα)` and `sin(mα)`. [`Wigner::rotatez`] uses it to
//! bring an occultor onto the `+y` axis before the occultation integral.
//!
//! ## Convention
//!
//! With `M` the axis-angle matrix, the rotated coefficients `y' = R·y` describe the
//! intensity `I'(v) = I(Mᵀ·v)`.

use nalgebra::{DMatrix, RowDVector, Vector3};

use crate::autodiff::{Dual, Scalar};
use crate::occult_errors::OccultError;

/// Axis-angle (Rodrigues) rotation matrix for a unit `axis`, given `cos θ` and `sin θ`.
pub fn axis_angle_matrix<T: Scalar>(axis: &Vector3<f64>, c: T, s: T) -> [[T; 3]; 3] {
    let (ux, uy, uz) = (axis.x, axis.y, axis.z);
    let omc = T::one() - c;
    [
        [c + omc * (ux * ux), omc * (ux * uy) - s * uz, omc * (ux * uz) + s * uy],
        [omc * (uy * ux) + s * uz, c + omc * (uy * uy), omc * (uy * uz) - s * ux],
        [omc * (uz * ux) - s * uy, omc * (uz * uy) + s * ux, c + omc * (uz * uz)],
    ]
}

/// Ivanic–Ruedenberg recursion. Block `l` is stored row-major, `(2l+1)²` entries.
fn ivanic_ruedenberg<T: Scalar>(m3: &[[T; 3]; 3], lmax: usize) -> Vec<Vec<T>> {
    // order m = -1, 0, 1 of the real l = 1 harmonics is y, z, x
    const PERM: [usize; 3] = [1, 2, 0];
    let r1 = |i: i32, j: i32| m3[PERM[(i + 1) as usize]][PERM[(j + 1) as usize]];

    let mut blocks: Vec<Vec<T>> = Vec::with_capacity(lmax + 1);
    blocks.push(vec![T::one()]);
    if lmax == 0 {
        return blocks;
    }

    let mut first = Vec::with_capacity(9);
    for i in -1..=1 {
        for j in -1..=1 {
            first.push(r1(i, j));
        }
    }
    blocks.push(first);

    for l in 2..=lmax {
        let li = l as i32;
        let prev = &blocks[l - 1];
        let wp = 2 * l - 1;
        let g = |a: i32, b: i32| prev[(a + li - 1) as usize * wp + (b + li - 1) as usize];
        let p = |i: i32, a: i32, b: i32| -> T {
            if b == li {
                r1(i, 1) * g(a, li - 1) - r1(i, -1) * g(a, -li + 1)
            } else if b == -li {
                r1(i, 1) * g(a, -li + 1) + r1(i, -1) * g(a, li - 1)
            } else {
                r1(i, 0) * g(a, b)
            }
        };

        let mut block = Vec::with_capacity((2 * l + 1) * (2 * l + 1));
        for m in -li..=li {
            let am = m.abs();
            let d = if m == 0 { 1.0 } else { 0.0 };
            for n in -li..=li {
                let den = if n.abs() < li {
                    ((li + n) * (li - n)) as f64
                } else {
                    (2 * li * (2 * li - 1)) as f64
                };
                let u = (((li + m) * (li - m)) as f64 / den).sqrt();
                let v = 0.5
                    * ((1.0 + d) * ((li + am - 1) * (li + am)) as f64 / den).sqrt()
                    * (1.0 - 2.0 * d);
                let w = -0.5 * (((li - am - 1) * (li - am)) as f64 / den).sqrt() * (1.0 - d);

                let mut val = T::zero();
                if u != 0.0 {
                    val += p(0, m, n) * u;
                }
                if v != 0.0 {
                    let vv = match m {
                        0 => p(1, 1, n) + p(-1, -1, n),
                        1 => p(1, 0, n) * std::f64::consts::SQRT_2,
                        -1 => p(-1, 0, n) * std::f64::consts::SQRT_2,
                        m if m > 0 => p(1, m - 1, n) - p(-1, -m + 1, n),
                        m => p(1, m + 1, n) + p(-1, -m - 1, n),
                    };
                    val += vv * v;
                }
                if w != 0.0 {
                    let ww = if m > 0 {
                        p(1, m + 1, n) + p(-1, -m - 1, n)
                    } else {
                        p(1, m - 1, n) - p(-1, -m + 1, n)
                    };
                    val += ww * w;
                }
                block.push(val);
            }
        }
        blocks.push(block);
    }
    blocks
}

/// Rotation state of a degree-`lmax` map about a fixed unit axis.
///
/// The blocks `R[l]`, `dR[l]/dθ` and the `cos(mα)`, `sin(mα)` caches describe the last
/// angle passed to [`Wigner::compute`] / [`Wigner::rotatez`]; they are stale as soon as the
/// angle or the axis changes.
#[derive(Debug, Clone)]
pub struct Wigner {
    lmax: usize,
    axis: Vector3<f64>,
    r: Vec<DMatrix<f64>>,
    dr: Vec<DMatrix<f64>>,
    cos_mt: Vec<f64>,
    sin_mt: Vec<f64>,
}

impl Wigner {
    /// Create the rotation state, normalising `axis`.
    ///
    /// Arguments
    /// ---------
    /// * `lmax` – maximum degree of the maps this engine rotates.
    /// * `axis` – rotation axis, any non-zero length.
    ///
    /// Return
    /// ----
    /// * The engine with identity blocks, or [`OccultError::ZeroAxis`].
    pub fn new(lmax: usize, axis: Vector3<f64>) -> Result<Self, OccultError> {
        Ok(Self::with_unit_axis(lmax, normalize_axis(axis)?))
    }

    /// Same as [`Wigner::new`] for an axis already of unit length.
    pub(crate) fn with_unit_axis(lmax: usize, axis: Vector3<f64>) -> Self {
        let r = (0..=lmax)
            .map(|l| DMatrix::identity(2 * l + 1, 2 * l + 1))
            .collect();
        let dr = (0..=lmax)
            .map(|l| DMatrix::zeros(2 * l + 1, 2 * l + 1))
            .collect();
        Wigner {
            lmax,
            axis,
            r,
            dr,
            cos_mt: vec![1.0; lmax + 1],
            sin_mt: vec![0.0; lmax + 1],
        }
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    pub fn axis(&self) -> &Vector3<f64> {
        &self.axis
    }

    /// Replace the rotation axis; it is normalised before use.
    pub fn set_axis(&mut self, axis: Vector3<f64>) -> Result<(), OccultError> {
        self.axis = normalize_axis(axis)?;
        Ok(())
    }

    /// Adopt the unit axis of a map; cached blocks become stale.
    pub(crate) fn align_axis(&mut self, axis: &Vector3<f64>) {
        self.axis = *axis;
    }

    /// Rotation block of degree `l` for the last computed angle.
    pub fn block(&self, l: usize) -> &DMatrix<f64> {
        &self.r[l]
    }

    /// `dR[l]/dθ` for the last computed angle.
    pub fn derivative_block(&self, l: usize) -> &DMatrix<f64> {
        &self.dr[l]
    }

    /// Build `R[l]` and `dR[l]/dθ` for every degree.
    pub fn compute(&mut self, cos_theta: f64, sin_theta: f64) {
        let c = Dual::<1>::new(cos_theta, [-sin_theta]);
        let s = Dual::<1>::new(sin_theta, [cos_theta]);
        let m3 = axis_angle_matrix(&self.axis, c, s);

        for (l, block) in ivanic_ruedenberg(&m3, self.lmax).into_iter().enumerate() {
            let w = 2 * l + 1;
            self.r[l] = DMatrix::from_fn(w, w, |i, j| block[i * w + j].val);
            self.dr[l] = DMatrix::from_fn(w, w, |i, j| block[i * w + j].grad[0]);
        }
    }

    /// `out = R·input` with the blocks of the last [`Wigner::compute`].
    ///
    /// `input` and `out` hold one column per wavelength channel.
    pub fn apply(&self, input: &DMatrix<f64>, out: &mut DMatrix<f64>) {
        apply_blocks(&self.r, input, out);
    }

    /// `out = dR/dθ·input` with the blocks of the last [`Wigner::compute`].
    pub fn apply_derivative(&self, input: &DMatrix<f64>, out: &mut DMatrix<f64>) {
        apply_blocks(&self.dr, input, out);
    }

    /// Row-vector product `row·R`.
    pub fn apply_transpose(&self, row: &RowDVector<f64>) -> RowDVector<f64> {
        let mut out = RowDVector::zeros(row.len());
        for (l, block) in self.r.iter().enumerate() {
            let w = 2 * l + 1;
            out.columns_mut(l * l, w)
                .copy_from(&(row.columns(l * l, w) * block));
        }
        out
    }

    /// Compute the blocks for `(cos θ, sin θ)` and write `R·input` into `out`.
    pub fn rotate(
        &mut self,
        cos_theta: f64,
        sin_theta: f64,
        input: &DMatrix<f64>,
        out: &mut DMatrix<f64>,
    ) {
        self.compute(cos_theta, sin_theta);
        self.apply(input, out);
    }

    /// Rotate about the `z` axis by `α`, given `cos α` and `sin α`.
    ///
    /// `cos(mα)` and `sin(mα)` are built by angle addition and cached for
    /// [`Wigner::rotatez_derivative`] and [`Wigner::rotatez_transpose`].
    pub fn rotatez(
        &mut self,
        cos_alpha: f64,
        sin_alpha: f64,
        input: &DMatrix<f64>,
        out: &mut DMatrix<f64>,
    ) {
        for m in 1..=self.lmax {
            let (c, s) = (self.cos_mt[m - 1], self.sin_mt[m - 1]);
            self.cos_mt[m] = c * cos_alpha - s * sin_alpha;
            self.sin_mt[m] = s * cos_alpha + c * sin_alpha;
        }

        out.copy_from(input);
        for l in 1..=self.lmax {
            for m in 1..=l as i32 {
                let (c, s) = (self.cos_mt[m as usize], self.sin_mt[m as usize]);
                let (ip, im) = (pos(l, m), pos(l, -m));
                for ch in 0..input.ncols() {
                    let (yp, ym) = (input[(ip, ch)], input[(im, ch)]);
                    out[(ip, ch)] = yp * c - ym * s;
                    out[(im, ch)] = yp * s + ym * c;
                }
            }
        }
    }

    /// `d/dα` of the last [`Wigner::rotatez`] applied to `input`.
    pub fn rotatez_derivative(&self, input: &DMatrix<f64>, out: &mut DMatrix<f64>) {
        out.fill(0.0);
        for l in 1..=self.lmax {
            for m in 1..=l as i32 {
                let mf = m as f64;
                let (c, s) = (self.cos_mt[m as usize], self.sin_mt[m as usize]);
                let (ip, im) = (pos(l, m), pos(l, -m));
                for ch in 0..input.ncols() {
                    let (yp, ym) = (input[(ip, ch)], input[(im, ch)]);
                    out[(ip, ch)] = -mf * (yp * s + ym * c);
                    out[(im, ch)] = mf * (yp * c - ym * s);
                }
            }
        }
    }

    /// Row-vector product `row·Rz` for the last [`Wigner::rotatez`] angle.
    pub fn rotatez_transpose(&self, row: &RowDVector<f64>) -> RowDVector<f64> {
        let mut out = row.clone();
        for l in 1..=self.lmax {
            for m in 1..=l as i32 {
                let (c, s) = (self.cos_mt[m as usize], self.sin_mt[m as usize]);
                let (ip, im) = (pos(l, m), pos(l, -m));
                out[ip] = row[ip] * c + row[im] * s;
                out[im] = row[im] * c - row[ip] * s;
            }
        }
        out
    }
}

#[inline]
fn pos(l: usize, m: i32) -> usize {
    crate::basis::lm_index(l, m)
}

fn normalize_axis(axis: Vector3<f64>) -> Result<Vector3<f64>, OccultError> {
    let norm = axis.norm();
    if norm == 0.0 || !norm.is_finite() {
        return Err(OccultError::ZeroAxis);
    }
    Ok(axis / norm)
}

fn apply_blocks(blocks: &[DMatrix<f64>], input: &DMatrix<f64>, out: &mut DMatrix<f64>) {
    for (l, block) in blocks.iter().enumerate() {
        let w = 2 * l + 1;
        out.rows_mut(l * l, w)
            .copy_from(&(block * input.rows(l * l, w)));
    }
}
