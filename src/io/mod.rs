//! Input/output helpers.
//!
//! - melt CSV ingest + validation (`ingest`)
//! - fraction-folded, construct and guesses JSON (`equations`)
//! - report/point/melt exports (`export`)

pub mod equations;
pub mod export;
pub mod ingest;

pub use equations::*;
pub use export::*;
pub use ingest::*;
