//! Error taxonomy shared by the library and the `ising` binary.
//!
//! Every variant carries owned strings only, so errors are `Clone` and a failed
//! fit session can keep a copy of the error that ended it.

use std::fmt::Display;
use std::path::Path;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IsingError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IsingError {
    /// Malformed construct or melt input.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A construct, melt or parameter name that should exist does not.
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// Inconsistent model setup (e.g. a construct with no persisted equation).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The initial-guess container itself is unusable.
    #[error("Invalid initial guesses: {0}")]
    InvalidGuesses(String),

    #[error("Invalid session state: {0}")]
    State(String),

    /// Minimizer failure or non-finite model output.
    #[error("Numeric failure: {0}")]
    Numeric(String),

    #[error("Parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("I/O error on '{path}': {message}")]
    Io { path: String, message: String },
}

impl IsingError {
    /// Process exit code used by the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            IsingError::Validation(_)
            | IsingError::Config(_)
            | IsingError::InvalidGuesses(_)
            | IsingError::Parse { .. }
            | IsingError::Io { .. } => 2,
            IsingError::Lookup(_) => 3,
            IsingError::State(_) | IsingError::Numeric(_) => 4,
        }
    }

    pub(crate) fn io(path: &Path, err: impl Display) -> Self {
        IsingError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        IsingError::Parse {
            offset,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_group_by_failure_class() {
        assert_eq!(IsingError::Validation("x".into()).exit_code(), 2);
        assert_eq!(IsingError::Lookup("x".into()).exit_code(), 3);
        assert_eq!(IsingError::Numeric("x".into()).exit_code(), 4);
        assert_eq!(IsingError::parse(3, "bad").exit_code(), 2);
    }

    #[test]
    fn io_error_mentions_path() {
        let err = IsingError::io(Path::new("/tmp/missing.json"), "not found");
        assert!(err.to_string().contains("/tmp/missing.json"));
        assert!(err.to_string().contains("not found"));
    }
}
