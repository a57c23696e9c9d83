// goal.rs: Goal and GoalTask records.
//
// A Goal is one unit of requested work. Goals form a forest per project via
// `parent_goal_id`; children are only ever created after their parent exists,
// so the forest has no cycles. Each Goal carries two independent workflow
// fields (see lifecycle.rs) and typed metadata (see metadata.rs).
//
// A GoalTask is a sub-step attached to a Goal: the seed clarification or
// analysis task written at creation, and one task per recorded test run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::{GoalPhase, LifecycleState};
use crate::metadata::GoalMetadata;

/// A Goal as persisted by a [`GoalStore`](crate::store::GoalStore).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    /// Assigned by the store on creation.
    pub id: Uuid,

    /// Owning project. Never changes.
    pub project_id: String,

    /// Parent goal, if this is a child. Never changes once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_goal_id: Option<Uuid>,

    /// The trimmed natural-language instruction.
    pub prompt: String,

    /// Short human label (e.g., "Add Login Form").
    pub title: String,

    /// Legacy linear phase.
    pub status: GoalPhase,

    /// Rich lifecycle state.
    #[serde(default)]
    pub lifecycle_state: LifecycleState,

    #[serde(default)]
    pub metadata: GoalMetadata,

    /// Cached working branch, filled in lazily.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,

    /// Archived goals are hidden from listings unless asked for.
    #[serde(default)]
    pub archived: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Goal {
    pub fn is_root(&self) -> bool {
        self.parent_goal_id.is_none()
    }

    /// Sibling order: creation time, then id.
    pub fn sibling_order(a: &Goal, b: &Goal) -> std::cmp::Ordering {
        a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
    }
}

/// Everything needed to create a Goal. The store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGoal {
    pub project_id: String,
    pub parent_goal_id: Option<Uuid>,
    pub prompt: String,
    pub title: String,
    pub status: GoalPhase,
    pub lifecycle_state: LifecycleState,
    pub metadata: GoalMetadata,
    pub branch_name: Option<String>,
}

impl NewGoal {
    /// A goal in phase `planning` and state `draft`.
    pub fn new(
        project_id: impl Into<String>,
        prompt: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            parent_goal_id: None,
            prompt: prompt.into(),
            title: title.into(),
            status: GoalPhase::Planning,
            lifecycle_state: LifecycleState::Draft,
            metadata: GoalMetadata::default(),
            branch_name: None,
        }
    }

    pub fn with_parent(mut self, parent_goal_id: Uuid) -> Self {
        self.parent_goal_id = Some(parent_goal_id);
        self
    }

    pub fn with_metadata(mut self, metadata: GoalMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_branch(mut self, branch_name: Option<String>) -> Self {
        self.branch_name = branch_name;
        self
    }

    /// Materialize the record with the given id and creation time.
    pub fn into_goal(self, id: Uuid, now: DateTime<Utc>) -> Goal {
        Goal {
            id,
            project_id: self.project_id,
            parent_goal_id: self.parent_goal_id,
            prompt: self.prompt,
            title: self.title,
            status: self.status,
            lifecycle_state: self.lifecycle_state,
            metadata: self.metadata,
            branch_name: self.branch_name,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What a GoalTask is for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GoalTaskKind {
    Clarification,
    Analysis,
    TestRun,
    #[serde(other)]
    Other,
}

impl fmt::Display for GoalTaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalTaskKind::Clarification => write!(f, "clarification"),
            GoalTaskKind::Analysis => write!(f, "analysis"),
            GoalTaskKind::TestRun => write!(f, "test-run"),
            GoalTaskKind::Other => write!(f, "other"),
        }
    }
}

/// Status of a GoalTask.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Passed,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in-progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Passed => write!(f, "passed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A sub-step attached to a Goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalTask {
    pub id: Uuid,
    pub goal_id: Uuid,
    #[serde(rename = "type")]
    pub kind: GoalTaskKind,
    pub title: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to create a GoalTask.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGoalTask {
    pub goal_id: Uuid,
    pub kind: GoalTaskKind,
    pub title: String,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
}

impl NewGoalTask {
    pub fn new(goal_id: Uuid, kind: GoalTaskKind, title: impl Into<String>) -> Self {
        Self {
            goal_id,
            kind,
            title: title.into(),
            payload: serde_json::Value::Null,
            status: TaskStatus::Pending,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn into_task(self, id: Uuid, now: DateTime<Utc>) -> GoalTask {
        GoalTask {
            id,
            goal_id: self.goal_id,
            kind: self.kind,
            title: self.title,
            payload: self.payload,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_goal() -> Goal {
        NewGoal::new("proj-1", "Add a login form", "Add a Login Form")
            .into_goal(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn new_goal_starts_in_planning_and_draft() {
        let goal = sample_goal();
        assert_eq!(goal.status, GoalPhase::Planning);
        assert_eq!(goal.lifecycle_state, LifecycleState::Draft);
        assert!(goal.is_root());
        assert!(!goal.archived);
        assert!(goal.branch_name.is_none());
    }

    #[test]
    fn goal_json_uses_camel_case_field_names() {
        let mut goal = sample_goal();
        goal.parent_goal_id = Some(Uuid::new_v4());
        let value = serde_json::to_value(&goal).unwrap();
        assert!(value.get("projectId").is_some());
        assert!(value.get("parentGoalId").is_some());
        assert_eq!(value["lifecycleState"], json!("draft"));
        assert_eq!(value["status"], json!("planning"));
        assert!(value.get("branchName").is_none());
    }

    #[test]
    fn missing_optional_fields_deserialize_to_defaults() {
        let value = json!({
            "id": Uuid::new_v4(),
            "projectId": "p",
            "prompt": "x",
            "title": "X",
            "status": "testing",
            "createdAt": Utc::now(),
            "updatedAt": Utc::now()
        });
        let goal: Goal = serde_json::from_value(value).unwrap();
        assert_eq!(goal.lifecycle_state, LifecycleState::Draft);
        assert_eq!(goal.metadata, GoalMetadata::default());
        assert!(goal.parent_goal_id.is_none());
    }

    #[test]
    fn task_kind_serializes_as_type() {
        let task = NewGoalTask::new(Uuid::new_v4(), GoalTaskKind::TestRun, "Run tests")
            .with_payload(json!({"summary": "ok"}))
            .into_task(Uuid::new_v4(), Utc::now());
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["type"], json!("test-run"));
        assert_eq!(value["status"], json!("pending"));

        let mut value = value;
        value["type"] = json!("deploy");
        let restored: GoalTask = serde_json::from_value(value).unwrap();
        assert_eq!(restored.kind, GoalTaskKind::Other);
    }

    #[test]
    fn sibling_order_breaks_ties_by_id() {
        let now = Utc::now();
        let a = NewGoal::new("p", "a", "A").into_goal(Uuid::from_u128(1), now);
        let b = NewGoal::new("p", "b", "B").into_goal(Uuid::from_u128(2), now);
        assert_eq!(Goal::sibling_order(&a, &b), std::cmp::Ordering::Less);
    }
}
