//! # gf-goal
//!
//! Goal records, lifecycle validation, persistence and events for goalforge.
//!
//! A [`Goal`] is one unit of requested work inside a per-project forest.
//! Every goal carries two independent workflow fields, validated by their own
//! transition tables, and typed metadata that is merged rather than replaced.
//!
//! ## Key components
//!
//! - [`Goal`] / [`GoalTask`]: the persisted records
//! - [`GoalPhase`]: legacy linear phase (planning → … → ready / failed)
//! - [`LifecycleState`]: rich lifecycle (draft → … → merged / cancelled)
//! - [`GoalMetadata`] / [`MetadataPatch`]: typed metadata and merge rules
//! - [`GoalStore`]: the persistence boundary; [`JsonGoalStore`] is bundled
//! - [`GoalEvent`] / [`EventDispatcher`]: lifecycle notifications

pub mod error;
pub mod events;
pub mod goal;
pub mod lifecycle;
pub mod metadata;
pub mod store;

pub use error::GoalError;
pub use events::{EventDispatcher, GoalEvent, LogSink, NotificationSink, PlanSource};
pub use goal::{Goal, GoalTask, GoalTaskKind, NewGoal, NewGoalTask, TaskStatus};
pub use lifecycle::{
    validate_phase_transition, validate_state_transition, GoalPhase, LifecycleState,
};
pub use metadata::{GoalMetadata, MetadataPatch};
pub use store::{GoalStore, JsonGoalStore};
