// events.rs: Goal events and notification dispatch.
//
// The orchestrator emits an event at each lifecycle point: goal created,
// phase or lifecycle state changed, plan persisted, test run recorded.
// Notification sinks (log files, UI bridges) subscribe to these events.
// Dispatch is synchronous and a failing sink never fails the operation
// that emitted the event.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GoalError;
use crate::goal::Goal;

/// Where a persisted plan came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// The language model's first answer.
    Model,
    /// The stricter re-prompt after a low-information answer.
    ModelRetry,
    /// The fixed heuristic plan used when the retry failed.
    HeuristicFallback,
    /// The fixed plan for pure style changes.
    StyleOnly,
}

/// Events emitted at key goal lifecycle points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GoalEvent {
    /// A new goal was persisted.
    GoalCreated {
        goal_id: Uuid,
        project_id: String,
        parent_goal_id: Option<Uuid>,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// The legacy phase changed.
    PhaseChanged {
        goal_id: Uuid,
        from_phase: String,
        to_phase: String,
        timestamp: DateTime<Utc>,
    },

    /// The lifecycle state changed.
    StateChanged {
        goal_id: Uuid,
        from_state: String,
        to_state: String,
        timestamp: DateTime<Utc>,
    },

    /// A planned tree was written below a parent goal.
    PlanPersisted {
        parent_goal_id: Uuid,
        goal_count: usize,
        source: PlanSource,
        timestamp: DateTime<Utc>,
    },

    /// A test run finished and was recorded as a task.
    TestRunRecorded {
        goal_id: Uuid,
        task_id: Uuid,
        passed: bool,
        timestamp: DateTime<Utc>,
    },
}

impl GoalEvent {
    /// Get the event type name as a string.
    pub fn event_type(&self) -> &str {
        match self {
            GoalEvent::GoalCreated { .. } => "goal_created",
            GoalEvent::PhaseChanged { .. } => "phase_changed",
            GoalEvent::StateChanged { .. } => "state_changed",
            GoalEvent::PlanPersisted { .. } => "plan_persisted",
            GoalEvent::TestRunRecorded { .. } => "test_run_recorded",
        }
    }

    pub fn goal_created(goal: &Goal) -> Self {
        GoalEvent::GoalCreated {
            goal_id: goal.id,
            project_id: goal.project_id.clone(),
            parent_goal_id: goal.parent_goal_id,
            title: goal.title.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn phase_changed(goal_id: Uuid, from: impl ToString, to: impl ToString) -> Self {
        GoalEvent::PhaseChanged {
            goal_id,
            from_phase: from.to_string(),
            to_phase: to.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn state_changed(goal_id: Uuid, from: impl ToString, to: impl ToString) -> Self {
        GoalEvent::StateChanged {
            goal_id,
            from_state: from.to_string(),
            to_state: to.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn plan_persisted(parent_goal_id: Uuid, goal_count: usize, source: PlanSource) -> Self {
        GoalEvent::PlanPersisted {
            parent_goal_id,
            goal_count,
            source,
            timestamp: Utc::now(),
        }
    }

    pub fn test_run_recorded(goal_id: Uuid, task_id: Uuid, passed: bool) -> Self {
        GoalEvent::TestRunRecorded {
            goal_id,
            task_id,
            passed,
            timestamp: Utc::now(),
        }
    }
}

/// Receives goal events.
pub trait NotificationSink: Send + Sync {
    /// Handle an event. Errors are logged but don't stop the caller.
    fn send(&self, event: &GoalEvent) -> Result<(), GoalError>;
}

/// Appends events as JSONL to a file.
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl NotificationSink for LogSink {
    fn send(&self, event: &GoalEvent) -> Result<(), GoalError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| GoalError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| GoalError::IoError {
                path: self.path.display().to_string(),
                source,
            })?;

        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json).map_err(|source| GoalError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;

        Ok(())
    }
}

/// Dispatches events to every registered sink.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn dispatch(&self, event: &GoalEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!("notification sink error: {}", e);
            }
        }
    }
}
