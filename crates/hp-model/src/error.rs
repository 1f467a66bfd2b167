//! Cycle model errors.

use hp_char::CharError;
use hp_core::HpError;
use hp_econ::CostError;
use hp_engine::EngineError;
use hp_fluids::FluidError;
use hp_graph::GraphError;
use hp_project::ProjectError;
use hp_results::ResultsError;
use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    /// Unknown topology, econ type or variable choice; missing parameter.
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    /// Solver residual at or above the convergence limit after a design phase.
    #[error("Design did not converge in {phase} phase (residual {residual:e})")]
    DesignUnconverged { phase: &'static str, residual: f64 },

    #[error("Constraint violated at {connection}: {what} ({value} against limit {limit})")]
    ConstraintViolation {
        connection: String,
        what: String,
        value: f64,
        limit: f64,
    },

    /// A sweep cell that could not be set up or solved. Logged by the sweep, never returned
    /// from it.
    #[error("Off-design cell failed at T_hs_ff={t_hs_ff}, T_cons_ff={t_cons_ff}, pl={pl}: {message}")]
    OffdesignCellFailed {
        t_hs_ff: f64,
        t_cons_ff: f64,
        pl: f64,
        message: String,
    },

    #[error(transparent)]
    Core(#[from] HpError),

    #[error(transparent)]
    Project(ProjectError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Fluid(#[from] FluidError),

    #[error(transparent)]
    Results(#[from] ResultsError),

    #[error(transparent)]
    Cost(#[from] CostError),

    #[error(transparent)]
    Char(#[from] CharError),
}

impl ModelError {
    pub fn configuration(what: impl Into<String>) -> Self {
        ModelError::Configuration { what: what.into() }
    }
}

impl From<ProjectError> for ModelError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::MissingKey { key } => ModelError::Configuration {
                what: format!("missing parameter '{key}'"),
            },
            other => ModelError::Project(other),
        }
    }
}
