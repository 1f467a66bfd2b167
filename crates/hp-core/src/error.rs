use thiserror::Error;

pub type HpResult<T> = Result<T, HpError>;

/// Failures shared by every crate in the workspace.
///
/// Downstream error enums wrap this one with `#[from]` and convert their own
/// variants into it when they cross a crate boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HpError {
    #[error("invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("model invariant broken: {what}")]
    Invariant { what: String },
}

impl HpError {
    pub fn invalid(what: impl Into<String>) -> Self {
        Self::InvalidArg { what: what.into() }
    }
}
