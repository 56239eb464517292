//! # Kepler's equation
//!
//! Eccentric and true anomalies of a closed Keplerian orbit.
//!
//! [`solve_kepler`] finds `E` such that `E − e·sin E = M` by Newton's method started from
//! `E = M`. Any root lies in `[M − e, M + e]`; that interval is kept as a bracket and tightened
//! after every residual evaluation, and a Newton step landing outside it is replaced by a
//! bisection step. This keeps the iteration convergent up to `e → 1`, where plain Newton from
//! `E = M` can oscillate.
//!
//! Non-convergence is reported, not raised: the solver always returns its last iterate
//! together with a flag, and the caller decides whether the stale value is acceptable.

use crate::constants::{Radian, DPI};
use crate::occult_errors::OccultError;

/// Outcome of [`solve_kepler`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeplerSolution {
    /// Last iterate of the eccentric anomaly (rad).
    pub eccentric_anomaly: Radian,
    /// Newton/bisection updates performed.
    pub iterations: usize,
    /// `|E − e·sin E − M|` at the returned iterate.
    pub residual: f64,
    pub converged: bool,
}

impl KeplerSolution {
    /// The eccentric anomaly, or [`OccultError::KeplerNonConvergence`].
    pub fn into_result(self) -> Result<Radian, OccultError> {
        if self.converged {
            Ok(self.eccentric_anomaly)
        } else {
            Err(OccultError::KeplerNonConvergence {
                iterations: self.iterations,
                residual: self.residual,
            })
        }
    }
}

/// Value of an angle in `[0, 2π)`.
pub fn principal_angle(a: Radian) -> Radian {
    a.rem_euclid(DPI)
}

/// Solve Kepler's equation `E − e·sin E = M` for an elliptic orbit.
///
/// Arguments
/// ---------
/// * `mean_anomaly` – `M` in radians.
/// * `ecc` – eccentricity, `0 ≤ e < 1`.
/// * `eps` – tolerance on `|E − e·sin E − M|`.
/// * `maxiter` – maximum number of updates.
///
/// Return
/// ----
/// * A [`KeplerSolution`]; for `e = 0` it is `E = M` exactly, with no iteration.
///
/// See also
/// --------
/// * [`true_anomaly`] – converts the result to the true anomaly.
pub fn solve_kepler(mean_anomaly: Radian, ecc: f64, eps: f64, maxiter: usize) -> KeplerSolution {
    if ecc == 0.0 {
        return KeplerSolution {
            eccentric_anomaly: mean_anomaly,
            iterations: 0,
            residual: 0.0,
            converged: true,
        };
    }

    let kepler = |e_anom: f64| e_anom - ecc * e_anom.sin() - mean_anomaly;
    let (mut lo, mut hi) = (mean_anomaly - ecc, mean_anomaly + ecc);
    let mut e_anom = mean_anomaly;
    let mut residual = kepler(e_anom);
    let mut iterations = 0;

    while residual.abs() > eps && iterations < maxiter {
        if residual > 0.0 {
            hi = e_anom;
        } else {
            lo = e_anom;
        }
        let newton = e_anom - residual / (1.0 - ecc * e_anom.cos());
        e_anom = if newton.is_finite() && newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };
        residual = kepler(e_anom);
        iterations += 1;
    }

    KeplerSolution {
        eccentric_anomaly: e_anom,
        iterations,
        residual: residual.abs(),
        converged: residual.abs() <= eps,
    }
}

/// True anomaly from the eccentric anomaly, through the half-angle identity
/// `tan(f/2) = √((1+e)/(1−e))·tan(E/2)`.
pub fn true_anomaly(eccentric_anomaly: Radian, ecc: f64) -> Radian {
    if ecc == 0.0 {
        return eccentric_anomaly;
    }
    let half = 0.5 * eccentric_anomaly;
    2.0 * ((1.0 + ecc).sqrt() * half.sin()).atan2((1.0 - ecc).sqrt() * half.cos())
}
