// lifecycle.rs: The two state machines carried by every Goal.
//
// A Goal has two independent workflow fields:
//
//   Phase (legacy, linear):
//     planning → testing → implementing → verifying → ready
//     (testing, implementing and verifying may also go to failed)
//
//   Lifecycle state (used by the progress view):
//     draft → planned → executing → verifying → ready-to-merge → merged
//     executing ⇄ needs-user-input, failed → executing,
//     and cancelled from every non-terminal state.
//
// Both tables only validate. Persisting the new value is the caller's job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GoalError;

/// Legacy linear workflow phase (the `status` field on a Goal).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GoalPhase {
    Planning,
    Testing,
    Implementing,
    Verifying,
    Ready,
    Failed,
}

impl GoalPhase {
    pub const ALL: [GoalPhase; 6] = [
        GoalPhase::Planning,
        GoalPhase::Testing,
        GoalPhase::Implementing,
        GoalPhase::Verifying,
        GoalPhase::Ready,
        GoalPhase::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalPhase::Planning => "planning",
            GoalPhase::Testing => "testing",
            GoalPhase::Implementing => "implementing",
            GoalPhase::Verifying => "verifying",
            GoalPhase::Ready => "ready",
            GoalPhase::Failed => "failed",
        }
    }

    /// Phases reachable in one step from this phase.
    pub fn successors(&self) -> &'static [GoalPhase] {
        match self {
            GoalPhase::Planning => &[GoalPhase::Testing],
            GoalPhase::Testing => &[GoalPhase::Implementing, GoalPhase::Failed],
            GoalPhase::Implementing => &[GoalPhase::Verifying, GoalPhase::Failed],
            GoalPhase::Verifying => &[GoalPhase::Ready, GoalPhase::Failed],
            GoalPhase::Ready | GoalPhase::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, next: GoalPhase) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Validate `self → next`, returning the target on success.
    pub fn transition(&self, next: GoalPhase) -> Result<GoalPhase, GoalError> {
        if !self.can_transition_to(next) {
            return Err(GoalError::InvalidPhaseTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        Ok(next)
    }
}

impl fmt::Display for GoalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalPhase {
    type Err = GoalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        GoalPhase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == wanted)
            .ok_or_else(|| GoalError::UnknownPhase(s.to_string()))
    }
}

/// Rich lifecycle state (the `lifecycleState` field on a Goal).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    #[default]
    Draft,
    Planned,
    Executing,
    NeedsUserInput,
    Verifying,
    ReadyToMerge,
    Merged,
    Failed,
    Cancelled,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 9] = [
        LifecycleState::Draft,
        LifecycleState::Planned,
        LifecycleState::Executing,
        LifecycleState::NeedsUserInput,
        LifecycleState::Verifying,
        LifecycleState::ReadyToMerge,
        LifecycleState::Merged,
        LifecycleState::Failed,
        LifecycleState::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Draft => "draft",
            LifecycleState::Planned => "planned",
            LifecycleState::Executing => "executing",
            LifecycleState::NeedsUserInput => "needs-user-input",
            LifecycleState::Verifying => "verifying",
            LifecycleState::ReadyToMerge => "ready-to-merge",
            LifecycleState::Merged => "merged",
            LifecycleState::Failed => "failed",
            LifecycleState::Cancelled => "cancelled",
        }
    }

    /// States reachable in one step from this state.
    pub fn successors(&self) -> &'static [LifecycleState] {
        use LifecycleState::*;
        match self {
            Draft => &[Planned, Cancelled],
            Planned => &[Executing, Cancelled],
            Executing => &[Verifying, NeedsUserInput, Failed, Cancelled],
            NeedsUserInput => &[Executing, Failed, Cancelled],
            Verifying => &[ReadyToMerge, Failed, Cancelled],
            ReadyToMerge => &[Merged, Cancelled],
            Failed => &[Executing, Cancelled],
            Merged | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Validate `self → next`, returning the target on success.
    pub fn transition(&self, next: LifecycleState) -> Result<LifecycleState, GoalError> {
        if !self.can_transition_to(next) {
            return Err(GoalError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        Ok(next)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = GoalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        LifecycleState::ALL
            .into_iter()
            .find(|state| state.as_str() == wanted)
            .ok_or_else(|| GoalError::UnknownState(s.to_string()))
    }
}

/// Validate a phase change given by name.
pub fn validate_phase_transition(from: &str, to: &str) -> Result<GoalPhase, GoalError> {
    let from: GoalPhase = from.parse()?;
    let to: GoalPhase = to.parse()?;
    from.transition(to)
}

/// Validate a lifecycle change given by name. Unknown names on either side
/// are reported as `unknown goal state`.
pub fn validate_state_transition(from: &str, to: &str) -> Result<LifecycleState, GoalError> {
    let from: LifecycleState = from.parse()?;
    let to: LifecycleState = to.parse()?;
    from.transition(to)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHASE_EDGES: &[(GoalPhase, GoalPhase)] = &[
        (GoalPhase::Planning, GoalPhase::Testing),
        (GoalPhase::Testing, GoalPhase::Implementing),
        (GoalPhase::Testing, GoalPhase::Failed),
        (GoalPhase::Implementing, GoalPhase::Verifying),
        (GoalPhase::Implementing, GoalPhase::Failed),
        (GoalPhase::Verifying, GoalPhase::Ready),
        (GoalPhase::Verifying, GoalPhase::Failed),
    ];

    const STATE_EDGES: &[(&str, &str)] = &[
        ("draft", "planned"),
        ("draft", "cancelled"),
        ("planned", "executing"),
        ("planned", "cancelled"),
        ("executing", "verifying"),
        ("executing", "needs-user-input"),
        ("executing", "failed"),
        ("executing", "cancelled"),
        ("needs-user-input", "executing"),
        ("needs-user-input", "failed"),
        ("needs-user-input", "cancelled"),
        ("verifying", "ready-to-merge"),
        ("verifying", "failed"),
        ("verifying", "cancelled"),
        ("ready-to-merge", "merged"),
        ("ready-to-merge", "cancelled"),
        ("failed", "executing"),
        ("failed", "cancelled"),
    ];

    #[test]
    fn phase_table_matches_listed_edges_exactly() {
        for from in GoalPhase::ALL {
            for to in GoalPhase::ALL {
                let listed = PHASE_EDGES.contains(&(from, to));
                let result = validate_phase_transition(from.as_str(), to.as_str());
                assert_eq!(result.is_ok(), listed, "{from} -> {to}");
                if !listed {
                    assert!(matches!(
                        result,
                        Err(GoalError::InvalidPhaseTransition { .. })
                    ));
                }
            }
        }
    }

    #[test]
    fn state_table_matches_listed_edges_exactly() {
        for from in LifecycleState::ALL {
            for to in LifecycleState::ALL {
                let listed = STATE_EDGES.contains(&(from.as_str(), to.as_str()));
                let result = validate_state_transition(from.as_str(), to.as_str());
                assert_eq!(result.is_ok(), listed, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn self_transitions_are_rejected() {
        assert!(!GoalPhase::Planning.can_transition_to(GoalPhase::Planning));
        assert!(!LifecycleState::Executing.can_transition_to(LifecycleState::Executing));
        let err = validate_state_transition("draft", "draft").unwrap_err();
        assert_eq!(err.to_string(), "invalid goal transition from draft to draft");
    }

    #[test]
    fn unknown_names_are_reported() {
        let err = validate_phase_transition("planning", "shipping").unwrap_err();
        assert_eq!(err.to_string(), "unknown phase: shipping");

        let err = validate_state_transition("limbo", "planned").unwrap_err();
        assert_eq!(err.to_string(), "unknown goal state: limbo");
        let err = validate_state_transition("draft", "limbo").unwrap_err();
        assert_eq!(err.to_string(), "unknown goal state: limbo");
    }

    #[test]
    fn terminal_states() {
        assert!(GoalPhase::Ready.is_terminal());
        assert!(GoalPhase::Failed.is_terminal());
        assert!(LifecycleState::Merged.is_terminal());
        assert!(LifecycleState::Cancelled.is_terminal());
        assert!(!LifecycleState::Failed.is_terminal());
    }

    #[test]
    fn serde_names_match_display() {
        let json = serde_json::to_string(&LifecycleState::NeedsUserInput).unwrap();
        assert_eq!(json, "\"needs-user-input\"");
        let json = serde_json::to_string(&GoalPhase::Implementing).unwrap();
        assert_eq!(json, "\"implementing\"");
        assert_eq!(LifecycleState::default(), LifecycleState::Draft);
    }
}
