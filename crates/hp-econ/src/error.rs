use hp_engine::EngineError;
use thiserror::Error;

pub type CostResult<T> = Result<T, CostError>;

#[derive(Error, Debug)]
pub enum CostError {
    #[error("No CEPCI value for year {year}")]
    MissingYear { year: i32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CEPCI table: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
