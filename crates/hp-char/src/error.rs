use hp_core::HpError;
use hp_results::ResultsError;
use thiserror::Error;

pub type CharResult<T> = Result<T, CharError>;

#[derive(Error, Debug)]
pub enum CharError {
    /// No usable cells to work from.
    #[error("Empty operating map: {what}")]
    EmptyMap { what: String },

    #[error("Shape error: {what}")]
    Shape { what: String },

    /// Samples that do not determine a line.
    #[error("Cannot fit {what}")]
    Unfittable { what: String },

    #[error(transparent)]
    Core(#[from] HpError),

    #[error(transparent)]
    Results(#[from] ResultsError),
}
