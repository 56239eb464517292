pub mod autodiff;
pub mod basis;
pub mod constants;
pub mod elliptic;
pub mod kepler;
pub mod maps;
pub mod occult_errors;
pub mod orbital;
pub mod rotation;
pub mod solver;
