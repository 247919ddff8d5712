//! Data sources beyond CSV ingest.
//!
//! - `sample`: synthetic melts drawn from the forward model

pub mod sample;

pub use sample::*;
