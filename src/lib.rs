//! `ising-melts` library crate.
//!
//! Global 1D Ising (nearest-neighbour) fits of repeat-protein denaturation
//! melts. The pieces, bottom-up:
//!
//! - `math`: exact partition-function polynomials and the transfer matrix
//! - `models`: fraction-folded derivation and the signal model
//! - `expr`: parsing and compiling saved fraction-folded expressions
//! - `fit`: the global Levenberg–Marquardt session
//! - `io`, `report`, `plot`, `data`: files in and out, terminal output, synthetic melts
//!
//! The binary (`ising`) is a thin wrapper around [`app::run`].

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod expr;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
