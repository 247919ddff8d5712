//! Ising-model implementations.
//!
//! - `partition`: partition functions and closed-form fraction folded
//! - `model`: the observed-signal model (baselines mixed by fraction folded)

pub mod model;
pub mod partition;

pub use model::*;
pub use partition::*;
