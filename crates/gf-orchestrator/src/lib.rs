//! # gf-orchestrator
//!
//! Goal creation, planning and lifecycle orchestration for goalforge.
//!
//! The orchestrator is synchronous and stateless. Everything it needs from the
//! outside world arrives through traits: a [`GoalStore`](gf_goal::GoalStore)
//! for persistence, a [`LanguageModelClient`] for planning, a [`JobRunner`]
//! for test runs, and the optional [`ProjectContextProvider`] and
//! [`BranchProvider`].
//!
//! ## Key components
//!
//! - [`GoalOrchestrator`]: create goals, plan them into trees, advance
//!   phase and lifecycle state, cache working branches, re-plan after
//!   clarification
//! - [`TestRunCoordinator`]: run tests through the job runner and record
//!   `test-run` tasks
//! - [`PlannerConfig`]: `.goalforge/planner.toml`

pub mod branch;
pub mod cancel;
pub mod config;
pub mod context;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod orchestrator;
pub mod test_runs;

pub use branch::{BranchError, BranchProvider};
pub use cancel::CancellationToken;
pub use config::{PlannerConfig, PlanningConfig, ProjectPaths, TestRunConfig};
pub use context::ProjectContextProvider;
pub use error::{ConfigError, OrchestratorError};
pub use jobs::{Job, JobError, JobLog, JobRequest, JobRunner, JobStatus};
pub use llm::{ChatMessage, GenerationOptions, LanguageModelClient, ModelError, Role};
pub use orchestrator::{
    CreatedGoal, GoalOrchestrator, PersistedGoalNode, PlanOutcome, PlanRequest,
    CLARIFICATION_ANSWERS_KEY,
};
pub use test_runs::{TestRunCoordinator, TestRunRequest};
