//! Policy decision engine
//!
//! `evaluate` is a pure function of (policy, action): no hidden state,
//! fully deterministic, safe to re-run for audit replay.

use serde::{Deserialize, Serialize};
use tracing::debug;

use warden_types::Action;

use crate::document::{Policy, PolicyOutcome, PolicyRule};

/// Rule id reported when the default outcome applies
pub const DEFAULT_RULE_ID: &str = "default";

/// The result of evaluating one action against a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Allow, Deny or Escalate
    pub outcome: PolicyOutcome,
    /// Id of the matched rule, or "default"
    pub rule_id: String,
    /// Human-readable reason
    pub reason: String,
}

/// Evaluates actions against one immutable policy
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    policy: Policy,
}

impl PolicyEngine {
    /// Build an engine over a validated policy.
    ///
    /// The policy is re-validated here so an engine can never hold a
    /// malformed document, no matter how the caller obtained it.
    pub fn new(policy: Policy) -> warden_types::Result<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    /// The loaded policy (read-only)
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Evaluate an action: first matching rule in declaration order wins;
    /// no match falls back to the declared default outcome.
    pub fn evaluate(&self, action: &Action) -> PolicyDecision {
        for rule in &self.policy.rules {
            if rule.matches_kind(&action.kind) && params_match(rule, action) {
                let decision = PolicyDecision {
                    outcome: rule.outcome,
                    rule_id: rule.id.clone(),
                    reason: rule
                        .reason
                        .clone()
                        .unwrap_or_else(|| format!("matched rule '{}'", rule.id)),
                };
                debug!(
                    action_id = %action.id,
                    kind = %action.kind,
                    rule_id = %decision.rule_id,
                    outcome = %decision.outcome,
                    "policy decision"
                );
                return decision;
            }
        }

        let decision = PolicyDecision {
            outcome: self.policy.default_outcome,
            rule_id: DEFAULT_RULE_ID.to_string(),
            reason: format!(
                "no rule matched '{}'; default outcome is {}",
                action.kind, self.policy.default_outcome
            ),
        };
        debug!(
            action_id = %action.id,
            kind = %action.kind,
            outcome = %decision.outcome,
            "policy decision (default)"
        );
        decision
    }
}

fn params_match(rule: &PolicyRule, action: &Action) -> bool {
    rule.params
        .iter()
        .all(|pred| action.params.get(&pred.key) == Some(&pred.equals))
}
