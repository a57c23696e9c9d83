// error.rs: Error types for the goal model, lifecycle and store.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while validating or persisting goals.
#[derive(Debug, Error)]
pub enum GoalError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize goal data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The requested goal was not found.
    #[error("goal not found: {0}")]
    NotFound(Uuid),

    /// The requested goal task was not found.
    #[error("goal task not found: {0}")]
    TaskNotFound(Uuid),

    /// A phase name that is not part of the legacy workflow.
    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    /// The phase table does not allow this edge.
    #[error("invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: String, to: String },

    /// A lifecycle state name that is not part of the lifecycle graph.
    #[error("unknown goal state: {0}")]
    UnknownState(String),

    /// The lifecycle table does not allow this edge.
    #[error("invalid goal transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A backend-specific store failure (database, remote API, ...).
    #[error("goal store error: {0}")]
    Store(String),
}
