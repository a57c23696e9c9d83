// test_runs.rs: Run a goal's tests through the job runner and record the
// outcome as a `test-run` GoalTask.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use gf_goal::{
    EventDispatcher, GoalEvent, GoalStore, GoalTask, GoalTaskKind, NewGoalTask, TaskStatus,
};

use crate::config::TestRunConfig;
use crate::error::{OrchestratorError, Result};
use crate::jobs::{Job, JobLog, JobRequest, JobRunner, JobStatus};

const TEST_JOB_TYPE: &str = "test";

/// What to run for a goal's tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TestRunRequest {
    pub cwd: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl TestRunRequest {
    pub fn new(cwd: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Blocks on the job runner and records each run on the goal.
pub struct TestRunCoordinator {
    store: Arc<dyn GoalStore>,
    jobs: Arc<dyn JobRunner>,
    config: TestRunConfig,
    events: EventDispatcher,
}

impl TestRunCoordinator {
    pub fn new(store: Arc<dyn GoalStore>, jobs: Arc<dyn JobRunner>) -> Self {
        Self {
            store,
            jobs,
            config: TestRunConfig::default(),
            events: EventDispatcher::new(),
        }
    }

    pub fn with_config(mut self, config: TestRunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// Run the tests and record a `test-run` task with status `passed` or
    /// `failed`.
    pub fn run_tests_for_goal(&self, goal_id: Uuid, request: TestRunRequest) -> Result<GoalTask> {
        if request.cwd.trim().is_empty() {
            return Err(OrchestratorError::required("cwd"));
        }
        if request.command.trim().is_empty() {
            return Err(OrchestratorError::required("command"));
        }
        let goal = self
            .store
            .get_goal(goal_id)?
            .ok_or(OrchestratorError::GoalNotFound(goal_id))?;

        let command_line = request.command_line();
        let started = self.jobs.start_job(JobRequest {
            project_id: goal.project_id.clone(),
            job_type: TEST_JOB_TYPE.to_string(),
            command: request.command.clone(),
            args: request.args.clone(),
            cwd: request.cwd.clone(),
            env: request.env.clone(),
        })?;
        tracing::info!(goal_id = %goal_id, job_id = %started.id, "running tests: {}", command_line);
        let job = self.jobs.wait_for_job_completion(&started.id)?;

        let passed = job.status == JobStatus::Succeeded;
        let summary = summarize(&job, &command_line);
        let payload = json!({
            "jobId": job.id,
            "command": request.command,
            "args": request.args,
            "cwd": request.cwd,
            "status": job.status,
            "exitCode": job.exit_code,
            "summary": summary,
            "logExcerpt": log_excerpt(&job.logs, self.config.max_log_lines),
        });
        let status = if passed {
            TaskStatus::Passed
        } else {
            TaskStatus::Failed
        };
        let task = self.store.create_goal_task(
            NewGoalTask::new(goal_id, GoalTaskKind::TestRun, format!("Test run: {}", command_line))
                .with_payload(payload)
                .with_status(status),
        )?;

        tracing::info!(goal_id = %goal_id, task_id = %task.id, passed, "{}", summary);
        self.events
            .dispatch(&GoalEvent::test_run_recorded(goal_id, task.id, passed));
        Ok(task)
    }
}

/// One-line outcome of a finished job.
fn summarize(job: &Job, command_line: &str) -> String {
    match (job.status, job.exit_code) {
        (JobStatus::Succeeded, _) => format!("Tests passed: {}", command_line),
        (status, Some(code)) => {
            format!("Tests {} with exit code {}: {}", status, code, command_line)
        }
        (status, None) => format!("Tests {}: {}", status, command_line),
    }
}

/// The last `max_lines` log entries as `"{stream}: {message}"` lines.
pub fn log_excerpt(logs: &[JobLog], max_lines: usize) -> String {
    let skip = logs.len().saturating_sub(max_lines);
    logs[skip..]
        .iter()
        .map(|log| format!("{}: {}", log.stream, log.message))
        .collect::<Vec<_>>()
        .join("\n")
}
