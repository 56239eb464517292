//! Complete elliptic integrals through Carlson's symmetric forms.
//!
//! The duplication theorem is iterated until the arguments agree to within a relative
//! `ERRTOL`, then a fifth-order Taylor expansion finishes the job. Every routine is generic
//! over [`Scalar`], so running them on dual numbers yields exact derivatives of `K`, `E` and
//! `Π` with respect to the parameter and the characteristic.
//!
//! Conventions use the *parameter* `m = k²`:
//!
//! * `K(m) = ∫₀^{π/2} dθ / √(1 − m sin²θ)`
//! * `E(m) = ∫₀^{π/2} √(1 − m sin²θ) dθ`
//! * `Π(n, m) = ∫₀^{π/2} dθ / ((1 − n sin²θ) √(1 − m sin²θ))`

use crate::autodiff::Scalar;

const ERRTOL: f64 = 1e-3;
const MAXITER: usize = 100;

fn max_dev<T: Scalar>(devs: &[T]) -> f64 {
    devs.iter().map(|d| d.value().abs()).fold(0.0, f64::max)
}

/// Carlson's `R_F(x, y, z)`.
pub fn carlson_rf<T: Scalar>(x: T, y: T, z: T) -> T {
    let (mut x, mut y, mut z) = (x, y, z);
    let mut iter = 0;

    let (mu, dx, dy, dz) = loop {
        let (sx, sy, sz) = (x.sqrt(), y.sqrt(), z.sqrt());
        let lambda = sx * sy + sy * sz + sz * sx;
        x = (x + lambda) * 0.25;
        y = (y + lambda) * 0.25;
        z = (z + lambda) * 0.25;
        let mu = (x + y + z) / 3.0;
        let (dx, dy, dz) = (T::one() - x / mu, T::one() - y / mu, T::one() - z / mu);
        iter += 1;
        if max_dev(&[dx, dy, dz]) < ERRTOL || iter >= MAXITER {
            break (mu, dx, dy, dz);
        }
    };

    let e2 = dx * dy - dz * dz;
    let e3 = dx * dy * dz;
    (T::one() - e2 / 10.0 + e3 / 14.0 + e2 * e2 / 24.0 - e2 * e3 * (3.0 / 44.0)) / mu.sqrt()
}

/// Carlson's degenerate `R_C(x, y)`, `y > 0`.
pub fn carlson_rc<T: Scalar>(x: T, y: T) -> T {
    let (mut x, mut y) = (x, y);
    let mut iter = 0;

    let (mu, s) = loop {
        let lambda = x.sqrt() * y.sqrt() * 2.0 + y;
        x = (x + lambda) * 0.25;
        y = (y + lambda) * 0.25;
        let mu = (x + y * 2.0) / 3.0;
        let s = (y - mu) / mu;
        iter += 1;
        if s.value().abs() < ERRTOL || iter >= MAXITER {
            break (mu, s);
        }
    };

    let series = T::one()
        + s * s * (s * (s * (s * (9.0 / 22.0) + 3.0 / 8.0) + 1.0 / 7.0) + 3.0 / 10.0);
    series / mu.sqrt()
}

/// Carlson's `R_D(x, y, z)`.
pub fn carlson_rd<T: Scalar>(x: T, y: T, z: T) -> T {
    let (mut x, mut y, mut z) = (x, y, z);
    let mut sum = T::zero();
    let mut fac = 1.0;
    let mut iter = 0;

    let (mu, dx, dy, dz) = loop {
        let (sx, sy, sz) = (x.sqrt(), y.sqrt(), z.sqrt());
        let lambda = sx * sy + sy * sz + sz * sx;
        sum += T::one() / (sz * (z + lambda)) * fac;
        fac *= 0.25;
        x = (x + lambda) * 0.25;
        y = (y + lambda) * 0.25;
        z = (z + lambda) * 0.25;
        let mu = (x + y + z * 3.0) / 5.0;
        let (dx, dy, dz) = ((mu - x) / mu, (mu - y) / mu, (mu - z) / mu);
        iter += 1;
        if max_dev(&[dx, dy, dz]) < ERRTOL || iter >= MAXITER {
            break (mu, dx, dy, dz);
        }
    };

    let (c1, c2, c3, c4) = (3.0 / 14.0, 1.0 / 6.0, 9.0 / 22.0, 3.0 / 26.0);
    let (c5, c6) = (0.25 * c3, 1.5 * c4);
    let ea = dx * dy;
    let eb = dz * dz;
    let ec = ea - eb;
    let ed = ea - eb * 6.0;
    let ee = ed + ec * 2.0;

    let series = T::one()
        + ed * (ed * c5 - dz * ee * c6 - c1)
        + dz * (ee * c2 + dz * (dz * ea * c4 - ec * c3));
    sum * 3.0 + series * fac / (mu * mu.sqrt())
}

/// Carlson's `R_J(x, y, z, p)` for `p > 0`.
pub fn carlson_rj<T: Scalar>(x: T, y: T, z: T, p: T) -> T {
    let (mut x, mut y, mut z, mut p) = (x, y, z, p);
    let mut sum = T::zero();
    let mut fac = 1.0;
    let mut iter = 0;

    let (mu, dx, dy, dz, dp) = loop {
        let (sx, sy, sz) = (x.sqrt(), y.sqrt(), z.sqrt());
        let lambda = sx * sy + sy * sz + sz * sx;
        let alpha = (p * (sx + sy + sz) + sx * sy * sz).powi(2);
        let beta = p * (p + lambda).powi(2);
        sum += carlson_rc(alpha, beta) * fac;
        fac *= 0.25;
        x = (x + lambda) * 0.25;
        y = (y + lambda) * 0.25;
        z = (z + lambda) * 0.25;
        p = (p + lambda) * 0.25;
        let mu = (x + y + z + p * 2.0) / 5.0;
        let (dx, dy, dz, dp) = ((mu - x) / mu, (mu - y) / mu, (mu - z) / mu, (mu - p) / mu);
        iter += 1;
        if max_dev(&[dx, dy, dz, dp]) < ERRTOL || iter >= MAXITER {
            break (mu, dx, dy, dz, dp);
        }
    };

    let (c1, c2, c3, c4) = (3.0 / 14.0, 1.0 / 3.0, 3.0 / 22.0, 3.0 / 26.0);
    let (c5, c6, c7, c8) = (0.75 * c3, 1.5 * c4, 0.5 * c2, 3.0 / 11.0);
    let ea = dx * (dy + dz) + dy * dz;
    let eb = dx * dy * dz;
    let ec = dp * dp;
    let ed = ea - ec * 3.0;
    let ee = eb + dp * (ea - ec) * 2.0;

    let series = T::one()
        + ed * (ed * c5 - ee * c6 - c1)
        + eb * (dp * (dp * c4 - c8) + c7)
        + dp * ea * (-(dp * c3) + c2)
        - dp * ec * c2;
    sum * 3.0 + series * fac / (mu * mu.sqrt())
}

/// Complete elliptic integral of the first kind `K(m)`.
pub fn ellip_k<T: Scalar>(m: T) -> T {
    carlson_rf(T::zero(), T::one() - m, T::one())
}

/// Complete elliptic integral of the second kind `E(m)`.
pub fn ellip_e<T: Scalar>(m: T) -> T {
    let y = T::one() - m;
    carlson_rf(T::zero(), y, T::one()) - m / 3.0 * carlson_rd(T::zero(), y, T::one())
}

/// Both `K(m)` and `E(m)`, sharing the `R_F` evaluation.
pub fn ellip_ke<T: Scalar>(m: T) -> (T, T) {
    let y = T::one() - m;
    let k = carlson_rf(T::zero(), y, T::one());
    let e = k - m / 3.0 * carlson_rd(T::zero(), y, T::one());
    (k, e)
}

/// Complete elliptic integral of the third kind `Π(n, m)`, `n < 1`.
pub fn ellip_pi<T: Scalar>(n: T, m: T) -> T {
    let y = T::one() - m;
    carlson_rf(T::zero(), y, T::one())
        + n / 3.0 * carlson_rj(T::zero(), y, T::one(), T::one() - n)
}

#[cfg(test)]
mod elliptic_test {
    use super::*;
    use crate::autodiff::Dual;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_values() {
        assert_relative_eq!(ellip_k(0.0), std::f64::consts::FRAC_PI_2, epsilon = 1e-15);
        assert_relative_eq!(ellip_e(0.0), std::f64::consts::FRAC_PI_2, epsilon = 1e-15);
        assert_relative_eq!(ellip_k(0.5), 1.854_074_677_301_372, epsilon = 1e-13);
        assert_relative_eq!(ellip_e(0.5), 1.350_643_881_047_675_5, epsilon = 1e-13);
        assert_relative_eq!(ellip_k(0.9), 2.578_092_113_348_173, epsilon = 1e-13);
        assert_relative_eq!(ellip_e(0.9), 1.104_774_732_704_073, epsilon = 1e-13);
    }

    #[test]
    fn test_third_kind() {
        assert_relative_eq!(ellip_pi(-2.0, 0.1), 0.924_408_532_815_874, epsilon = 1e-12);
        assert_relative_eq!(ellip_pi(0.4, 0.5), 2.446_830_433_868_489, epsilon = 1e-12);
        assert_relative_eq!(ellip_pi(-0.3, 0.9), 2.183_189_648_560_905, epsilon = 1e-12);
        // Π(0, m) = K(m)
        assert_relative_eq!(ellip_pi(0.0, 0.3), ellip_k(0.3), epsilon = 1e-15);
    }

    #[test]
    fn test_derivatives() {
        let m0 = 0.37;
        let m = Dual::<1>::variable(m0, 0);
        let (k, e) = ellip_ke(m);
        let (kv, ev) = (k.val, e.val);
        // dK/dm = (E − (1 − m) K) / (2 m (1 − m)),  dE/dm = (E − K) / (2 m)
        assert_relative_eq!(
            k.grad[0],
            (ev - (1.0 - m0) * kv) / (2.0 * m0 * (1.0 - m0)),
            epsilon = 1e-12
        );
        assert_relative_eq!(e.grad[0], (ev - kv) / (2.0 * m0), epsilon = 1e-12);
    }
}
