//! hp-project: heat pump parameter sets.
//!
//! [`Params`] mirrors the nested parameter document the cycle model reads
//! (`setup`, `fluids`, component blocks, connection states, off-design grid).
//! Files are JSON or YAML; every load and save runs [`validate_params`].

use std::path::Path;

pub mod schema;
pub mod validate;

pub use schema::*;
pub use validate::{ValidationError, validate_params};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("parameter `{key}` is required but missing")]
    MissingKey { key: String },

    #[error("parameter file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parameter YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("parameter JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn checked(params: Params) -> ProjectResult<Params> {
    validate_params(&params)?;
    Ok(params)
}

pub fn from_json_str(json: &str) -> ProjectResult<Params> {
    checked(serde_json::from_str(json)?)
}

pub fn from_yaml_str(yaml: &str) -> ProjectResult<Params> {
    checked(serde_yaml::from_str(yaml)?)
}

pub fn load_json(path: &Path) -> ProjectResult<Params> {
    from_json_str(&std::fs::read_to_string(path)?)
}

pub fn load_yaml(path: &Path) -> ProjectResult<Params> {
    from_yaml_str(&std::fs::read_to_string(path)?)
}

/// Written pretty-printed so parameter files stay diffable.
pub fn save_json(path: &Path, params: &Params) -> ProjectResult<()> {
    validate_params(params)?;
    std::fs::write(path, serde_json::to_string_pretty(params)?)?;
    Ok(())
}

pub fn save_yaml(path: &Path, params: &Params) -> ProjectResult<()> {
    validate_params(params)?;
    std::fs::write(path, serde_yaml::to_string(params)?)?;
    Ok(())
}
