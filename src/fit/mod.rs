//! Global fit orchestration.
//!
//! Responsibilities:
//!
//! - lay the named parameters out as the minimizer's vector (`layout`)
//! - assemble the combined residual vector and its Jacobian (`problem`)
//! - drive Levenberg–Marquardt and own the session state (`session`)

pub mod layout;
pub mod problem;
pub mod session;

pub use layout::*;
pub use problem::*;
pub use session::*;
