//! Runtime state machine
//!
//! One execution lifecycle:
//!
//! ```text
//! Created -> IntentBound -> PlanApproved -> Authorized -> Executing <-> Escalated
//! ```
//!
//! with terminal states `Completed`, `Aborted`, `Terminated`. The valid
//! transition set is a total function over (from, to); anything not in
//! the table is illegal, and an illegal transition is a security
//! violation, never a warning.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one executing plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeState {
    Created,
    IntentBound,
    PlanApproved,
    Authorized,
    Executing,
    Escalated,
    Completed,
    Aborted,
    Terminated,
}

impl RuntimeState {
    /// Whether this state is terminal. Terminal states are absorbing:
    /// nothing transitions out of them, not even re-entry.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Terminated)
    }

    /// Stable wire name, matching the serde representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::IntentBound => "INTENT_BOUND",
            Self::PlanApproved => "PLAN_APPROVED",
            Self::Authorized => "AUTHORIZED",
            Self::Executing => "EXECUTING",
            Self::Escalated => "ESCALATED",
            Self::Completed => "COMPLETED",
            Self::Aborted => "ABORTED",
            Self::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static transition table as a total function over (from, to).
///
/// Every non-terminal state may abort or terminate; terminal states
/// accept nothing.
pub fn is_valid_transition(from: RuntimeState, to: RuntimeState) -> bool {
    use RuntimeState::*;

    if from.is_terminal() {
        return false;
    }
    // Abort and terminate are reachable from any live state.
    if matches!(to, Aborted | Terminated) {
        return true;
    }
    matches!(
        (from, to),
        (Created, IntentBound)
            | (IntentBound, PlanApproved)
            | (PlanApproved, Authorized)
            | (Authorized, Executing)
            | (Executing, Escalated)
            | (Escalated, Executing)
            | (Executing, Completed)
    )
}

/// True only while the runtime may perform side-effecting steps
pub fn can_execute(state: RuntimeState) -> bool {
    state == RuntimeState::Executing
}

/// True only in states where authority tokens may be issued
pub fn can_issue_authority(state: RuntimeState) -> bool {
    matches!(state, RuntimeState::Authorized | RuntimeState::Executing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use RuntimeState::*;

    const ALL: [RuntimeState; 9] = [
        Created,
        IntentBound,
        PlanApproved,
        Authorized,
        Executing,
        Escalated,
        Completed,
        Aborted,
        Terminated,
    ];

    #[test]
    fn test_happy_path_is_valid() {
        let path = [Created, IntentBound, PlanApproved, Authorized, Executing, Completed];
        for pair in path.windows(2) {
            assert!(is_valid_transition(pair[0], pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_escalation_round_trip() {
        assert!(is_valid_transition(Executing, Escalated));
        assert!(is_valid_transition(Escalated, Executing));
    }

    #[test]
    fn test_terminals_are_absorbing() {
        for from in [Completed, Aborted, Terminated] {
            for to in ALL {
                assert!(!is_valid_transition(from, to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_no_self_transition_on_terminals() {
        assert!(!is_valid_transition(Aborted, Aborted));
        assert!(!is_valid_transition(Completed, Completed));
    }

    #[test]
    fn test_abort_reachable_from_every_live_state() {
        for from in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(is_valid_transition(*from, Aborted));
            assert!(is_valid_transition(*from, Terminated));
        }
    }

    #[test]
    fn test_skipping_states_is_illegal() {
        assert!(!is_valid_transition(Created, Executing));
        assert!(!is_valid_transition(IntentBound, Authorized));
        assert!(!is_valid_transition(PlanApproved, Executing));
    }

    #[test]
    fn test_capability_predicates() {
        for state in ALL {
            assert_eq!(can_execute(state), state == Executing);
            assert_eq!(
                can_issue_authority(state),
                matches!(state, Authorized | Executing)
            );
        }
    }
}
