//! Error types for engine operations.

use std::path::PathBuf;

use hp_core::HpError;
use thiserror::Error;

/// Errors raised across the flowsheet engine boundary.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown {what} '{label}'")]
    UnknownLabel { what: &'static str, label: String },

    #[error("Not supported by engine: {what}")]
    Unsupported { what: String },

    /// The solver raised instead of returning a residual.
    #[error("Solver error: {message}")]
    Solver { message: String },

    #[error("Snapshot {}: {message}", path.display())]
    Snapshot { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<EngineError> for HpError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::UnknownLabel { .. } | EngineError::Unsupported { .. } => {
                HpError::InvalidArg {
                    what: e.to_string(),
                }
            }
            other => HpError::Invariant {
                what: other.to_string(),
            },
        }
    }
}
