// error.rs: Error types for the goal orchestrator.

use thiserror::Error;
use uuid::Uuid;

use crate::branch::BranchError;
use crate::jobs::JobError;
use crate::llm::ModelError;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A required argument was missing or blank.
    #[error("{0}")]
    Validation(String),

    #[error("goal not found: {0}")]
    GoalNotFound(Uuid),

    #[error("parent goal not found: {0}")]
    ParentNotFound(Uuid),

    #[error("child goal must use same projectId")]
    ProjectMismatch,

    /// Store failure or rejected lifecycle transition.
    #[error(transparent)]
    Goal(#[from] gf_goal::GoalError),

    /// The model's planning reply could not be used.
    #[error(transparent)]
    Plan(#[from] gf_planner::PlanError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Branch(#[from] BranchError),

    #[error("planning was cancelled")]
    Cancelled,
}

impl OrchestratorError {
    pub(crate) fn required(field: &str) -> Self {
        OrchestratorError::Validation(format!("{} is required", field))
    }
}

/// Errors loading planner.toml.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid planner config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
