//! Expression compiler for persisted fraction-folded equations.
//!
//! - `parse`: text → unbound [`Expr`] tree, errors carry byte offsets
//! - `compile`: [`Expr`] → [`CompiledExpr`], bound against the global slots

pub mod compile;
pub mod parse;

pub use compile::*;
pub use parse::*;
