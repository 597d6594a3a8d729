//! Warden Escalation - Pluggable approve/deny capability
//!
//! When policy returns ESCALATE, the enforcement gate consults a
//! resolver. The resolver is an abstract capability the host injects; it
//! may be long-running or remote. Absent an explicit approver, escalation
//! fails closed: the bundled [`DefaultDenyResolver`] always denies.
//!
//! An APPROVE result grants nothing by itself. It only permits the gate
//! to retry the policy path as if the original decision had been ALLOW,
//! still subject to every authority check.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use warden_runtime::RuntimeState;
use warden_types::{Action, Result, RuntimeId, TenantId};

/// The external approver's verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationDecision {
    Approve,
    Deny,
}

impl std::fmt::Display for EscalationDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Approve => "APPROVE",
            Self::Deny => "DENY",
        })
    }
}

/// Everything a resolver may see about the escalated action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRequest {
    /// The action awaiting approval
    pub action: Action,
    /// Reason the policy escalated
    pub reason: String,
    /// Runtime context
    pub runtime_id: RuntimeId,
    /// Runtime state at escalation time
    pub runtime_state: RuntimeState,
    /// Owning tenant
    pub tenant: TenantId,
}

/// The resolver's answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationResult {
    pub decision: EscalationDecision,
    pub reason: String,
}

impl EscalationResult {
    pub fn approve(reason: impl Into<String>) -> Self {
        Self {
            decision: EscalationDecision::Approve,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            decision: EscalationDecision::Deny,
            reason: reason.into(),
        }
    }
}

/// Pluggable escalation capability. Real resolvers (human-in-the-loop,
/// remote approval services) are injected by the host, never hardcoded.
#[async_trait]
pub trait EscalationResolver: Send + Sync {
    async fn resolve(&self, request: EscalationRequest) -> Result<EscalationResult>;
}

/// Fail-closed default: every escalation is denied
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDenyResolver;

#[async_trait]
impl EscalationResolver for DefaultDenyResolver {
    async fn resolve(&self, request: EscalationRequest) -> Result<EscalationResult> {
        debug!(action_id = %request.action.id, "default-deny resolver consulted");
        Ok(EscalationResult::deny(
            "no escalation resolver configured; denying by default",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use warden_types::ProvenanceLabel;

    fn request() -> EscalationRequest {
        EscalationRequest {
            action: Action::new(
                "send_email",
                BTreeMap::new(),
                ProvenanceLabel::ExternalTrusted,
                TenantId::from("acme"),
            )
            .unwrap(),
            reason: "outbound email needs approval".to_string(),
            runtime_id: RuntimeId::new(),
            runtime_state: RuntimeState::Escalated,
            tenant: TenantId::from("acme"),
        }
    }

    #[tokio::test]
    async fn test_default_resolver_always_denies() {
        let result = DefaultDenyResolver.resolve(request()).await.unwrap();
        assert_eq!(result.decision, EscalationDecision::Deny);
    }
}
