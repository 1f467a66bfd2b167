use hp_core::CompId;
use thiserror::Error;

use crate::graph::PortRef;

pub type GraphResult<T> = Result<T, GraphError>;

/// Reasons a cycle graph is rejected by [`crate::GraphBuilder::build`] or a
/// label lookup fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("{owner} points at component {comp}, which was never added")]
    InvalidCompRef { owner: String, comp: CompId },

    #[error("connection {connection} attaches to {port}, which that component does not have")]
    InvalidPort { connection: String, port: PortRef },

    #[error("{port} is claimed by both {first} and {second}")]
    PortReuse {
        port: PortRef,
        first: String,
        second: String,
    },

    #[error("{port} of {component} is left open")]
    UnconnectedPort { component: String, port: PortRef },

    /// Every closed fluid loop needs exactly one cycle closer.
    #[error("loop [{}] is closed but has no cycle closer", .connections.join(", "))]
    MissingCycleCloser { connections: Vec<String> },

    #[error("surplus cycle closers [{}]", .closers.join(", "))]
    SurplusCycleCloser { closers: Vec<String> },

    #[error("{what} label `{label}` is used twice")]
    DuplicateLabel { what: &'static str, label: String },

    #[error("no {what} labelled `{label}`")]
    LabelNotFound { what: &'static str, label: String },
}
