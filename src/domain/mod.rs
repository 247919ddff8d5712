//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - chain topology (`Unit`, `Construct`) and experimental data (`Melt`, `MeltSet`)
//! - the shared/local parameter split (`GlobalParams`, `Baseline`, `Parameters`)
//! - run configuration and fit outputs (`FitConfig`, `FitReport`, etc.)

pub mod params;
pub mod types;

pub use params::*;
pub use types::*;
