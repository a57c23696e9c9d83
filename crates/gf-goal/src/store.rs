// store.rs: the GoalStore persistence boundary for goals and tasks.
//
// The planning engine holds no goal state of its own; every read and write
// goes through a GoalStore, which is the single point of truth and the
// serialization point for concurrent writers (last write wins).
//
// JsonGoalStore is the bundled implementation. Each record is a JSON file:
//   <root>/goals/<goal_id>.json
//   <root>/tasks/<task_id>.json
// which keeps records isolated and easy to inspect manually.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::GoalError;
use crate::goal::{Goal, GoalTask, NewGoal, NewGoalTask, TaskStatus};
use crate::lifecycle::{GoalPhase, LifecycleState};
use crate::metadata::GoalMetadata;

/// CRUD operations the orchestrator needs from durable storage.
///
/// Implementations must preserve the Goal/GoalTask field shapes and provide
/// read-your-writes consistency, since idempotent planning re-checks for
/// existing children right before creating new ones.
pub trait GoalStore: Send + Sync {
    /// Persist a new goal, assigning its id and timestamps.
    fn create_goal(&self, goal: NewGoal) -> Result<Goal, GoalError>;

    fn get_goal(&self, goal_id: Uuid) -> Result<Option<Goal>, GoalError>;

    /// All goals of a project, oldest first.
    fn list_goals(&self, project_id: &str, include_archived: bool)
        -> Result<Vec<Goal>, GoalError>;

    /// Write a new phase together with the (already merged) metadata.
    fn update_goal_status(
        &self,
        goal_id: Uuid,
        status: GoalPhase,
        metadata: GoalMetadata,
    ) -> Result<Goal, GoalError>;

    /// Write a new lifecycle state together with the (already merged) metadata.
    fn update_goal_lifecycle_state(
        &self,
        goal_id: Uuid,
        state: LifecycleState,
        metadata: GoalMetadata,
    ) -> Result<Goal, GoalError>;

    /// Cache the working branch name on a goal.
    fn update_goal_branch(&self, goal_id: Uuid, branch_name: &str) -> Result<Goal, GoalError>;

    /// Returns `false` when the goal did not exist.
    fn delete_goal(&self, goal_id: Uuid) -> Result<bool, GoalError>;

    fn create_goal_task(&self, task: NewGoalTask) -> Result<GoalTask, GoalError>;

    /// Tasks of a goal, oldest first.
    fn list_goal_tasks(&self, goal_id: Uuid) -> Result<Vec<GoalTask>, GoalError>;

    fn update_goal_task_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
    ) -> Result<GoalTask, GoalError>;
}

/// File-backed [`GoalStore`]: one JSON file per goal and per task.
pub struct JsonGoalStore {
    goals_dir: PathBuf,
    tasks_dir: PathBuf,
}

impl JsonGoalStore {
    /// Open (or create) a store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, GoalError> {
        let root = root.as_ref();
        let goals_dir = root.join("goals");
        let tasks_dir = root.join("tasks");
        for dir in [&goals_dir, &tasks_dir] {
            fs::create_dir_all(dir).map_err(|source| GoalError::IoError {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok(Self {
            goals_dir,
            tasks_dir,
        })
    }

    /// Overwrite a goal record.
    pub fn save_goal(&self, goal: &Goal) -> Result<(), GoalError> {
        write_record(&self.goal_file(goal.id), goal)
    }

    /// Mark a goal archived (hidden from default listings).
    pub fn archive_goal(&self, goal_id: Uuid) -> Result<Goal, GoalError> {
        self.modify_goal(goal_id, |goal| goal.archived = true)
    }

    fn modify_goal(
        &self,
        goal_id: Uuid,
        change: impl FnOnce(&mut Goal),
    ) -> Result<Goal, GoalError> {
        let mut goal = self.get_goal(goal_id)?.ok_or(GoalError::NotFound(goal_id))?;
        change(&mut goal);
        goal.updated_at = Utc::now();
        self.save_goal(&goal)?;
        Ok(goal)
    }

    fn get_task(&self, task_id: Uuid) -> Result<Option<GoalTask>, GoalError> {
        read_record(&self.task_file(task_id))
    }

    fn goal_file(&self, goal_id: Uuid) -> PathBuf {
        self.goals_dir.join(format!("{}.json", goal_id))
    }

    fn task_file(&self, task_id: Uuid) -> PathBuf {
        self.tasks_dir.join(format!("{}.json", task_id))
    }
}

impl GoalStore for JsonGoalStore {
    fn create_goal(&self, goal: NewGoal) -> Result<Goal, GoalError> {
        let goal = goal.into_goal(Uuid::new_v4(), Utc::now());
        self.save_goal(&goal)?;
        tracing::debug!(goal_id = %goal.id, project_id = %goal.project_id, "goal record written");
        Ok(goal)
    }

    fn get_goal(&self, goal_id: Uuid) -> Result<Option<Goal>, GoalError> {
        read_record(&self.goal_file(goal_id))
    }

    fn list_goals(
        &self,
        project_id: &str,
        include_archived: bool,
    ) -> Result<Vec<Goal>, GoalError> {
        let mut goals: Vec<Goal> = read_dir_records(&self.goals_dir)?
            .into_iter()
            .filter(|g: &Goal| g.project_id == project_id && (include_archived || !g.archived))
            .collect();
        goals.sort_by(Goal::sibling_order);
        Ok(goals)
    }

    fn update_goal_status(
        &self,
        goal_id: Uuid,
        status: GoalPhase,
        metadata: GoalMetadata,
    ) -> Result<Goal, GoalError> {
        self.modify_goal(goal_id, |goal| {
            goal.status = status;
            goal.metadata = metadata;
        })
    }

    fn update_goal_lifecycle_state(
        &self,
        goal_id: Uuid,
        state: LifecycleState,
        metadata: GoalMetadata,
    ) -> Result<Goal, GoalError> {
        self.modify_goal(goal_id, |goal| {
            goal.lifecycle_state = state;
            goal.metadata = metadata;
        })
    }

    fn update_goal_branch(&self, goal_id: Uuid, branch_name: &str) -> Result<Goal, GoalError> {
        self.modify_goal(goal_id, |goal| {
            goal.branch_name = Some(branch_name.to_string())
        })
    }

    fn delete_goal(&self, goal_id: Uuid) -> Result<bool, GoalError> {
        let path = self.goal_file(goal_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|source| GoalError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        // Tasks of a deleted goal go with it.
        for task in self.list_goal_tasks(goal_id)? {
            let task_path = self.task_file(task.id);
            fs::remove_file(&task_path).map_err(|source| GoalError::IoError {
                path: task_path.display().to_string(),
                source,
            })?;
        }
        Ok(true)
    }

    fn create_goal_task(&self, task: NewGoalTask) -> Result<GoalTask, GoalError> {
        if !self.goal_file(task.goal_id).exists() {
            return Err(GoalError::NotFound(task.goal_id));
        }
        let task = task.into_task(Uuid::new_v4(), Utc::now());
        write_record(&self.task_file(task.id), &task)?;
        Ok(task)
    }

    fn list_goal_tasks(&self, goal_id: Uuid) -> Result<Vec<GoalTask>, GoalError> {
        let mut tasks: Vec<GoalTask> = read_dir_records(&self.tasks_dir)?
            .into_iter()
            .filter(|t: &GoalTask| t.goal_id == goal_id)
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    fn update_goal_task_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
    ) -> Result<GoalTask, GoalError> {
        let mut task = self.get_task(task_id)?.ok_or(GoalError::TaskNotFound(task_id))?;
        task.status = status;
        task.updated_at = Utc::now();
        write_record(&self.task_file(task_id), &task)?;
        Ok(task)
    }
}

fn write_record<T: Serialize>(path: &Path, record: &T) -> Result<(), GoalError> {
    let json = serde_json::to_string_pretty(record)?;
    fs::write(path, json).map_err(|source| GoalError::IoError {
        path: path.display().to_string(),
        source,
    })
}

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, GoalError> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path).map_err(|source| GoalError::IoError {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Some(serde_json::from_str(&json)?))
}

/// Read every `*.json` record in `dir`, skipping files that fail to parse.
fn read_dir_records<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, GoalError> {
    let entries = fs::read_dir(dir).map_err(|source| GoalError::IoError {
        path: dir.display().to_string(),
        source,
    })?;

    let mut records = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| GoalError::IoError {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            let json = fs::read_to_string(&path).map_err(|source| GoalError::IoError {
                path: path.display().to_string(),
                source,
            })?;
            match serde_json::from_str::<T>(&json) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("skipping unreadable record {}: {}", path.display(), e),
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::GoalTaskKind;
    use tempfile::tempdir;

    fn open_store() -> (tempfile::TempDir, JsonGoalStore) {
        let dir = tempdir().unwrap();
        let store = JsonGoalStore::new(dir.path().join("store")).unwrap();
        (dir, store)
    }

    #[test]
    fn create_and_get_round_trip() {
        let (_dir, store) = open_store();
        let goal = store
            .create_goal(NewGoal::new("proj", "Add a login form", "Add a Login Form"))
            .unwrap();

        let found = store.get_goal(goal.id).unwrap().unwrap();
        assert_eq!(found, goal);
        assert_eq!(found.status, GoalPhase::Planning);
    }

    #[test]
    fn get_nonexistent_returns_none() {
        let (_dir, store) = open_store();
        assert!(store.get_goal(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn list_filters_by_project_and_archive_flag() {
        let (_dir, store) = open_store();
        let a = store.create_goal(NewGoal::new("p1", "a", "A")).unwrap();
        let b = store.create_goal(NewGoal::new("p1", "b", "B")).unwrap();
        store.create_goal(NewGoal::new("p2", "c", "C")).unwrap();
        store.archive_goal(b.id).unwrap();

        let visible = store.list_goals("p1", false).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, a.id);

        let all = store.list_goals("p1", true).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn status_and_state_updates_persist_metadata() {
        let (_dir, store) = open_store();
        let goal = store.create_goal(NewGoal::new("p", "x", "X")).unwrap();

        let mut metadata = goal.metadata.clone();
        metadata.acceptance_criteria.push("works".into());
        store
            .update_goal_status(goal.id, GoalPhase::Testing, metadata.clone())
            .unwrap();
        store
            .update_goal_lifecycle_state(goal.id, LifecycleState::Planned, metadata)
            .unwrap();

        let reloaded = store.get_goal(goal.id).unwrap().unwrap();
        assert_eq!(reloaded.status, GoalPhase::Testing);
        assert_eq!(reloaded.lifecycle_state, LifecycleState::Planned);
        assert_eq!(reloaded.metadata.acceptance_criteria, vec!["works"]);
        assert!(reloaded.updated_at >= reloaded.created_at);
    }

    #[test]
    fn update_missing_goal_returns_not_found() {
        let (_dir, store) = open_store();
        let result = store.update_goal_branch(Uuid::new_v4(), "goal/x");
        assert!(matches!(result, Err(GoalError::NotFound(_))));
    }

    #[test]
    fn tasks_are_listed_per_goal_and_removed_with_it() {
        let (_dir, store) = open_store();
        let goal = store.create_goal(NewGoal::new("p", "x", "X")).unwrap();
        let other = store.create_goal(NewGoal::new("p", "y", "Y")).unwrap();

        let task = store
            .create_goal_task(NewGoalTask::new(goal.id, GoalTaskKind::Analysis, "Analyze"))
            .unwrap();
        store
            .create_goal_task(NewGoalTask::new(other.id, GoalTaskKind::Analysis, "Analyze"))
            .unwrap();

        let updated = store
            .update_goal_task_status(task.id, TaskStatus::Completed)
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);

        let tasks = store.list_goal_tasks(goal.id).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Completed);

        assert!(store.delete_goal(goal.id).unwrap());
        assert!(!store.delete_goal(goal.id).unwrap());
        assert!(store.list_goal_tasks(goal.id).unwrap().is_empty());
        assert_eq!(store.list_goal_tasks(other.id).unwrap().len(), 1);
    }

    #[test]
    fn task_for_missing_goal_is_rejected() {
        let (_dir, store) = open_store();
        let result =
            store.create_goal_task(NewGoalTask::new(Uuid::new_v4(), GoalTaskKind::Analysis, "x"));
        assert!(matches!(result, Err(GoalError::NotFound(_))));
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");

        let id = {
            let store = JsonGoalStore::new(&root).unwrap();
            store.create_goal(NewGoal::new("p", "persist", "Persist")).unwrap().id
        };

        let store = JsonGoalStore::new(&root).unwrap();
        assert_eq!(store.get_goal(id).unwrap().unwrap().title, "Persist");
    }
}
