//! hp-results: persisted artifacts of a heat pump model.
//!
//! Layout under the model's working directory:
//!
//! ```text
//! stable/{subdirname}_design                      converged design snapshot
//! stable/{subdirname}_init                        warm-start snapshot of the sweep
//! output/{subdirname}_partload.csv                long-form operating map
//! output/logging/{subdirname}_offdesign_log.csv   per-attempt sweep log
//! ```

pub mod map;
pub mod store;
pub mod types;

pub use map::OperatingMap;
pub use store::{
    ArtifactStore, AttemptLog, read_attempt_log, read_partload_csv, write_partload_csv,
};
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Records do not form a complete rectangular grid.
    #[error("Shape error: {what}")]
    Shape { what: String },
}
