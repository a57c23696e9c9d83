// config.rs: Planner configuration.
//
// PlannerConfig is read from `.goalforge/planner.toml` in the project root.
// Every field has a serde default, so a missing file or a partial file both
// yield a usable config. ProjectPaths resolves the standard `.goalforge/`
// layout: config file, goal store directory and events log.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Setting this variable to `1` (or `true`) forces deterministic planning.
pub const DETERMINISTIC_ENV: &str = "GOALFORGE_DETERMINISTIC";

/// Top-level planner configuration from .goalforge/planner.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlannerConfig {
    #[serde(default)]
    pub planning: PlanningConfig,

    #[serde(default)]
    pub test_runs: TestRunConfig,
}

/// Planning call configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanningConfig {
    /// Deepest nesting kept from a model plan
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Most goals kept from a model plan, across the whole tree
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Temperature for the stricter re-prompt after a vague plan
    #[serde(default = "default_retry_temperature")]
    pub retry_temperature: f32,

    /// Skip the optional clarifying-question request (used by test suites)
    #[serde(default)]
    pub deterministic: bool,

    /// Ask the model for clarifying questions when heuristics found none
    #[serde(default = "default_request_model_questions")]
    pub request_model_questions: bool,

    /// Budget for the key-files snapshot in the planning message
    #[serde(default = "default_context_max_chars")]
    pub context_max_chars: usize,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_nodes: default_max_nodes(),
            temperature: default_temperature(),
            retry_temperature: default_retry_temperature(),
            deterministic: false,
            request_model_questions: default_request_model_questions(),
            context_max_chars: default_context_max_chars(),
        }
    }
}

/// Test run recording configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRunConfig {
    /// Log entries kept in a test-run task's excerpt (the last N)
    #[serde(default = "default_max_log_lines")]
    pub max_log_lines: usize,
}

impl Default for TestRunConfig {
    fn default() -> Self {
        Self {
            max_log_lines: default_max_log_lines(),
        }
    }
}

// Serde default functions
fn default_max_depth() -> usize {
    gf_planner::DEFAULT_MAX_DEPTH
}

fn default_max_nodes() -> usize {
    gf_planner::DEFAULT_MAX_NODES
}

fn default_temperature() -> f32 {
    0.2
}

fn default_retry_temperature() -> f32 {
    0.1
}

fn default_request_model_questions() -> bool {
    true
}

fn default_context_max_chars() -> usize {
    6000
}

fn default_max_log_lines() -> usize {
    200
}

impl PlannerConfig {
    /// Load planner config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Try to load config, returning default if the file is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Io { .. }) => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid planner config");
                Self::default()
            }
        }
    }

    /// Config for a project root: `.goalforge/planner.toml` plus environment
    /// overrides.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let paths = ProjectPaths::for_project(project_root);
        let mut config = Self::load_or_default(&paths.config_file);
        config.apply_env_overrides();
        config
    }

    /// Apply `GOALFORGE_DETERMINISTIC`.
    pub fn apply_env_overrides(&mut self) {
        let value = std::env::var(DETERMINISTIC_ENV).ok();
        self.apply_deterministic_override(value.as_deref());
    }

    fn apply_deterministic_override(&mut self, value: Option<&str>) {
        if matches!(value.map(str::trim), Some("1") | Some("true") | Some("TRUE")) {
            self.planning.deterministic = true;
        }
    }

    /// Whether the optional clarifying-question request should be made.
    pub fn wants_model_questions(&self) -> bool {
        self.planning.request_model_questions && !self.planning.deterministic
    }
}

/// Standard `.goalforge/` layout for a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectPaths {
    /// Root directory of the project.
    pub project_root: PathBuf,

    /// Path to planner.toml.
    pub config_file: PathBuf,

    /// Directory for the JSON goal store.
    pub goals_dir: PathBuf,

    /// Path to the goal event log.
    pub events_log: PathBuf,
}

impl ProjectPaths {
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let dir = root.join(".goalforge");
        Self {
            project_root: root,
            config_file: dir.join("planner.toml"),
            goals_dir: dir.join("store"),
            events_log: dir.join("events.jsonl"),
        }
    }
}
