//! # Forward-mode automatic differentiation
//!
//! The polynomial-basis evaluator, the elliptic integrals, the Wigner recursion and the
//! occultation solver are written **once**, against the [`Scalar`] trait, and instantiated
//! twice:
//!
//! - with `f64`, the fast path used when no gradient is requested;
//! - with [`Dual<N>`], a value carrying `N` partial derivatives, used to obtain
//!   gradients with respect to `(x, y)`, `(b, ro)` or the rotation angle.
//!
//! ## Example
//!
//! ```rust
//! use occult::autodiff::{Dual, Scalar};
//!
//! // f(x, y) = x² · sin(y) at (2, 0.5)
//! let x = Dual::<2>::variable(2.0, 0);
//! let y = Dual::<2>::variable(0.5, 1);
//! let f = x.powi(2) * y.sin();
//!
//! assert!((f.value() - 4.0 * 0.5_f64.sin()).abs() < 1e-15);
//! assert!((f.grad[0] - 4.0 * 0.5_f64.sin()).abs() < 1e-15);
//! assert!((f.grad[1] - 4.0 * 0.5_f64.cos()).abs() < 1e-15);
//! ```

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// Numeric type accepted by the generic flux and intensity kernels.
///
/// Comparisons that drive control flow (geometry regimes, convergence tests) are made on
/// [`Scalar::value`] so that the derivative part never changes which branch is taken.
pub trait Scalar:
    Copy
    + Debug
    + PartialEq
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
{
    /// Lift a constant (zero derivative).
    fn from_f64(v: f64) -> Self;

    /// The plain value, derivatives discarded.
    fn value(&self) -> f64;

    fn sqrt(self) -> Self;
    fn powi(self, n: i32) -> Self;
    fn powf(self, p: f64) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn asin(self) -> Self;
    fn acos(self) -> Self;
    fn atan2(self, other: Self) -> Self;
    fn abs(self) -> Self;

    fn zero() -> Self {
        Self::from_f64(0.0)
    }

    fn one() -> Self {
        Self::from_f64(1.0)
    }
}

impl Scalar for f64 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
    #[inline]
    fn value(&self) -> f64 {
        *self
    }
    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
    #[inline]
    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }
    #[inline]
    fn powf(self, p: f64) -> Self {
        f64::powf(self, p)
    }
    #[inline]
    fn sin(self) -> Self {
        f64::sin(self)
    }
    #[inline]
    fn cos(self) -> Self {
        f64::cos(self)
    }
    #[inline]
    fn asin(self) -> Self {
        f64::asin(self)
    }
    #[inline]
    fn acos(self) -> Self {
        f64::acos(self)
    }
    #[inline]
    fn atan2(self, other: Self) -> Self {
        f64::atan2(self, other)
    }
    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }
}

/// Dual number `value + Σ grad[i]·εᵢ` with `εᵢ εⱼ = 0`.
///
/// Arithmetic follows the chain rule, so any expression built from dual inputs carries its
/// exact first derivatives with respect to the `N` seeded variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual<const N: usize> {
    pub val: f64,
    pub grad: [f64; N],
}

impl<const N: usize> Dual<N> {
    pub fn new(val: f64, grad: [f64; N]) -> Self {
        Dual { val, grad }
    }

    pub fn constant(val: f64) -> Self {
        Dual {
            val,
            grad: [0.0; N],
        }
    }

    /// Independent variable number `index` (unit derivative in that slot).
    pub fn variable(val: f64, index: usize) -> Self {
        let mut grad = [0.0; N];
        grad[index] = 1.0;
        Dual { val, grad }
    }

    /// Apply `f(value)` with derivative `df` through the chain rule.
    #[inline]
    fn chain(self, val: f64, df: f64) -> Self {
        let mut grad = self.grad;
        for g in grad.iter_mut() {
            *g *= df;
        }
        Dual { val, grad }
    }
}

impl<const N: usize> Add for Dual<N> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        let mut grad = self.grad;
        for (g, r) in grad.iter_mut().zip(rhs.grad.iter()) {
            *g += r;
        }
        Dual {
            val: self.val + rhs.val,
            grad,
        }
    }
}

impl<const N: usize> Sub for Dual<N> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        let mut grad = self.grad;
        for (g, r) in grad.iter_mut().zip(rhs.grad.iter()) {
            *g -= r;
        }
        Dual {
            val: self.val - rhs.val,
            grad,
        }
    }
}

impl<const N: usize> Mul for Dual<N> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let mut grad = [0.0; N];
        for (i, g) in grad.iter_mut().enumerate() {
            *g = self.grad[i] * rhs.val + self.val * rhs.grad[i];
        }
        Dual {
            val: self.val * rhs.val,
            grad,
        }
    }
}

impl<const N: usize> Div for Dual<N> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.val;
        let val = self.val * inv;
        let mut grad = [0.0; N];
        for (i, g) in grad.iter_mut().enumerate() {
            *g = (self.grad[i] - val * rhs.grad[i]) * inv;
        }
        Dual { val, grad }
    }
}

impl<const N: usize> Neg for Dual<N> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.chain(-self.val, -1.0)
    }
}

impl<const N: usize> Add<f64> for Dual<N> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: f64) -> Self {
        Dual {
            val: self.val + rhs,
            grad: self.grad,
        }
    }
}

impl<const N: usize> Sub<f64> for Dual<N> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: f64) -> Self {
        Dual {
            val: self.val - rhs,
            grad: self.grad,
        }
    }
}

impl<const N: usize> Mul<f64> for Dual<N> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f64) -> Self {
        self.chain(self.val * rhs, rhs)
    }
}

impl<const N: usize> Div<f64> for Dual<N> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: f64) -> Self {
        self.chain(self.val / rhs, 1.0 / rhs)
    }
}

impl<const N: usize> AddAssign for Dual<N> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const N: usize> SubAssign for Dual<N> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<const N: usize> MulAssign for Dual<N> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<const N: usize> Scalar for Dual<N> {
    #[inline]
    fn from_f64(v: f64) -> Self {
        Dual::constant(v)
    }

    #[inline]
    fn value(&self) -> f64 {
        self.val
    }

    fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        if s == 0.0 {
            // infinite slope, but only along the directions the argument actually moves in
            let grad = self
                .grad
                .map(|g| if g == 0.0 { 0.0 } else { g.signum() * f64::INFINITY });
            return Dual { val: 0.0, grad };
        }
        self.chain(s, 0.5 / s)
    }

    fn powi(self, n: i32) -> Self {
        match n {
            0 => Dual::constant(1.0),
            1 => self,
            _ => self.chain(self.val.powi(n), n as f64 * self.val.powi(n - 1)),
        }
    }

    fn powf(self, p: f64) -> Self {
        if p == 0.0 {
            return Dual::constant(1.0);
        }
        self.chain(self.val.powf(p), p * self.val.powf(p - 1.0))
    }

    fn sin(self) -> Self {
        self.chain(self.val.sin(), self.val.cos())
    }

    fn cos(self) -> Self {
        self.chain(self.val.cos(), -self.val.sin())
    }

    fn asin(self) -> Self {
        self.chain(self.val.asin(), 1.0 / (1.0 - self.val * self.val).sqrt())
    }

    fn acos(self) -> Self {
        self.chain(self.val.acos(), -1.0 / (1.0 - self.val * self.val).sqrt())
    }

    fn atan2(self, other: Self) -> Self {
        let den = self.val * self.val + other.val * other.val;
        let mut grad = [0.0; N];
        for (i, g) in grad.iter_mut().enumerate() {
            *g = (other.val * self.grad[i] - self.val * other.grad[i]) / den;
        }
        Dual {
            val: self.val.atan2(other.val),
            grad,
        }
    }

    fn abs(self) -> Self {
        if self.val < 0.0 {
            -self
        } else {
            self
        }
    }
}

#[cfg(test)]
mod autodiff_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quotient_rule() {
        let x = Dual::<2>::variable(3.0, 0);
        let y = Dual::<2>::variable(2.0, 1);
        let f = x / y;
        assert_relative_eq!(f.val, 1.5);
        assert_relative_eq!(f.grad[0], 0.5);
        assert_relative_eq!(f.grad[1], -0.75);
    }

    #[test]
    fn test_sqrt_and_pow() {
        let x = Dual::<1>::variable(4.0, 0);
        let s = x.sqrt();
        assert_relative_eq!(s.val, 2.0);
        assert_relative_eq!(s.grad[0], 0.25);

        let p = x.powf(1.5);
        assert_relative_eq!(p.val, 8.0);
        assert_relative_eq!(p.grad[0], 3.0);

        let zero = Dual::<1>::constant(0.0).sqrt();
        assert_eq!(zero.grad[0], 0.0);

        let edge = Dual::<3>::new(0.0, [-2.0, 0.0, 1.0]).sqrt();
        assert_eq!(edge.val, 0.0);
        assert_eq!(edge.grad, [f64::NEG_INFINITY, 0.0, f64::INFINITY]);
    }

    #[test]
    fn test_atan2_matches_finite_difference() {
        let (y0, x0) = (0.3, -0.7);
        let y = Dual::<2>::variable(y0, 0);
        let x = Dual::<2>::variable(x0, 1);
        let f = y.atan2(x);
        let h = 1e-7;
        let dfy = ((y0 + h).atan2(x0) - (y0 - h).atan2(x0)) / (2.0 * h);
        let dfx = (y0.atan2(x0 + h) - y0.atan2(x0 - h)) / (2.0 * h);
        assert_relative_eq!(f.grad[0], dfy, epsilon = 1e-7);
        assert_relative_eq!(f.grad[1], dfx, epsilon = 1e-7);
    }

    #[test]
    fn test_trig_chain() {
        let t = Dual::<1>::variable(0.4, 0);
        let f = t.sin() * t.cos();
        assert_relative_eq!(f.grad[0], (2.0 * 0.4_f64).cos(), epsilon = 1e-15);

        let a = Dual::<1>::variable(0.2, 0).asin();
        assert_relative_eq!(a.grad[0], 1.0 / (1.0 - 0.04_f64).sqrt(), epsilon = 1e-15);
    }
}
