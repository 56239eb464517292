use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OccultError {
    #[error("Invalid value for `l` and/or `m`: l = {l}, m = {m} (lmax = {lmax})")]
    InvalidIndex { l: i32, m: i32, lmax: usize },

    #[error("Degree {degree} exceeds the map degree lmax = {lmax}")]
    DegreeOutOfRange { degree: usize, lmax: usize },

    #[error("Channel count mismatch: expected {expected} wavelength channels, got {found}")]
    ChannelMismatch { expected: usize, found: usize },

    #[error("Matrix shape mismatch: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Change-of-basis matrix for lmax = {lmax} is singular")]
    SingularBasis { lmax: usize },

    #[error("The rotation axis must have a non-zero length")]
    ZeroAxis,

    #[error(
        "Kepler solver did not converge after {iterations} iterations (residual = {residual:e})"
    )]
    KeplerNonConvergence { iterations: usize, residual: f64 },

    #[error("Invalid system: {0}")]
    InvalidSystem(String),
}
