//! Mathematical utilities: exact chain polynomials, transfer matrices and
//! fit covariance.

pub mod covariance;
pub mod polynomial;
pub mod transfer;

pub use covariance::*;
pub use polynomial::*;
pub use transfer::*;
