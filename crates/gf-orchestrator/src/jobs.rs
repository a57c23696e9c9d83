//! Job runner seam used by the test-run coordinator.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to start job: {0}")]
    Start(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job runner error: {0}")]
    Runner(String),
}

/// What to run and where.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub project_id: String,
    /// Job category, e.g. `"test"`.
    #[serde(rename = "type")]
    pub job_type: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// One captured output line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobLog {
    /// `stdout`, `stderr` or a runner-defined stream name.
    pub stream: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub logs: Vec<JobLog>,
}

/// Runs commands on behalf of goalforge.
pub trait JobRunner: Send + Sync {
    fn start_job(&self, request: JobRequest) -> Result<Job, JobError>;

    /// Block until the job reaches a terminal status.
    fn wait_for_job_completion(&self, job_id: &str) -> Result<Job, JobError>;
}
