//! Execution results
//!
//! One `ExecutionResult` per pass through the gate that reached the
//! handler. Denied attempts surface as errors instead; no result object
//! exists for an action that never executed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_escalation::EscalationDecision;
use warden_policy::PolicyOutcome;
use warden_types::{ActionId, TokenId};

/// The decision trail and outcome of one execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The attempted action
    pub action_id: ActionId,
    /// Policy decision that let execution proceed (ALLOW or ESCALATE)
    pub decision: PolicyOutcome,
    /// How escalation resolved, when the policy escalated
    pub escalation_outcome: Option<EscalationDecision>,
    /// Token consumed by this attempt
    pub token_id: Option<TokenId>,
    /// Whether the handler reported success
    pub success: bool,
    /// Handler error detail, when it failed
    pub detail: Option<String>,
    /// Handler output, when it succeeded
    pub output: Option<serde_json::Value>,
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
}
