//! Working-branch naming seam.

use gf_goal::Goal;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("branch provider failed: {0}")]
pub struct BranchError(pub String);

/// Names (and typically creates) the working branch for a goal.
pub trait BranchProvider: Send + Sync {
    fn branch_name_for(&self, goal: &Goal) -> Result<String, BranchError>;
}
