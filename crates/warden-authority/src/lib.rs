//! Warden Authority - The capability token registry
//!
//! Issues, tracks, consumes and revokes single-use authority tokens.
//! The token registry is the one piece of mutable state shared between
//! runtime instances; all mutations on a token go through its `DashMap`
//! shard lock, so racing operations on the same token serialize: two
//! concurrent consume attempts yield exactly one success.
//!
//! # Issuance invariants
//!
//! 1. Tokens are only issued while the runtime can issue authority
//!    (`Authorized` or `Executing`)
//! 2. `ExternalUntrusted` provenance never produces a token, regardless
//!    of the policy outcome
//! 3. The policy decision for the action must be ALLOW
//! 4. Every token is scoped to one (kind, binding, tenant, plan hash)
//!    combination and carries a bounded expiry

use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tracing::{info, warn};

use warden_audit::{AuditEvent, AuditEventKind, AuditSink};
use warden_policy::{PolicyEngine, PolicyOutcome};
use warden_runtime::{can_issue_authority, RuntimeInstance};
use warden_types::{
    Action, AuthorityToken, Result, RuntimeConfig, RuntimeId, TenantId, TokenId, TokenState,
    WardenError,
};

/// Issues, tracks, consumes and revokes authority tokens
pub struct AuthorityManager {
    tokens: DashMap<TokenId, AuthorityToken>,
    policy: Arc<PolicyEngine>,
    config: RuntimeConfig,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for AuthorityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityManager").finish_non_exhaustive()
    }
}

impl AuthorityManager {
    /// Build a manager over a loaded policy and validated config
    pub fn new(
        policy: Arc<PolicyEngine>,
        config: RuntimeConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tokens: DashMap::new(),
            policy,
            config,
            audit,
        })
    }

    /// The configuration this manager was built with
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Issue a fresh token for an action under a runtime instance.
    ///
    /// Checked in order: tenant, runtime state, provenance, policy.
    pub fn issue(&self, action: &Action, runtime: &RuntimeInstance) -> Result<AuthorityToken> {
        self.issue_inner(action, runtime, false)
    }

    /// Issue for an action whose ESCALATE decision was explicitly
    /// approved by a resolver. The approval substitutes only for the
    /// ALLOW requirement; state, provenance and tenant checks are
    /// unchanged, and a DENY decision still refuses.
    pub fn issue_approved(&self, action: &Action, runtime: &RuntimeInstance) -> Result<AuthorityToken> {
        self.issue_inner(action, runtime, true)
    }

    fn issue_inner(
        &self,
        action: &Action,
        runtime: &RuntimeInstance,
        escalation_approved: bool,
    ) -> Result<AuthorityToken> {
        self.check_tenant(&runtime.tenant, &action.tenant)?;

        if !can_issue_authority(runtime.state()) {
            return Err(WardenError::Unauthorized {
                reason: format!(
                    "runtime {} cannot issue authority in state {}",
                    runtime.id,
                    runtime.state()
                ),
            });
        }

        if !action.provenance.permits_authority() {
            warn!(
                action_id = %action.id,
                label = %action.provenance,
                "provenance violation: refusing to issue authority"
            );
            return Err(WardenError::ProvenanceViolation {
                label: action.provenance,
                context: format!("authority issuance for action {}", action.id),
            });
        }

        let decision = self.policy.evaluate(action);
        match decision.outcome {
            PolicyOutcome::Allow => {}
            PolicyOutcome::Deny => {
                return Err(WardenError::PolicyDeny {
                    action_id: action.id.to_string(),
                    reason: decision.reason,
                });
            }
            PolicyOutcome::Escalate if !escalation_approved => {
                return Err(WardenError::EscalationRequired {
                    action_id: action.id.to_string(),
                    reason: decision.reason,
                });
            }
            PolicyOutcome::Escalate => {}
        }

        let Some(plan_hash) = runtime.plan_hash.as_deref() else {
            return Err(WardenError::Unauthorized {
                reason: format!("runtime {} has no approved plan bound", runtime.id),
            });
        };

        let token = AuthorityToken::issue(
            action.kind.clone(),
            action.binding_hash()?,
            action.tenant.clone(),
            plan_hash,
            runtime.id,
            Duration::seconds(self.config.default_token_ttl_secs),
        );
        info!(token_id = %token.id, action_kind = %token.action_kind, "authority token issued");
        self.audit.record(
            AuditEvent::new(
                token.tenant.clone(),
                Some(runtime.id),
                AuditEventKind::TokenIssued {
                    token_id: token.id.to_string(),
                    action_kind: token.action_kind.clone(),
                },
            )
            .with_detail(serde_json::json!({
                "plan_hash": token.plan_hash,
                "expires_at": token.expires_at.to_rfc3339(),
            })),
        );
        self.tokens.insert(token.id, token.clone());
        Ok(token)
    }

    /// Issue-if-absent: reuse a live token already scoped to exactly this
    /// action binding under the same plan and runtime, otherwise issue.
    /// A token is never reused across different parameter bindings.
    pub fn issue_or_reuse(
        &self,
        action: &Action,
        runtime: &RuntimeInstance,
    ) -> Result<AuthorityToken> {
        let binding = action.binding_hash()?;
        let now = Utc::now();
        let existing = self.tokens.iter().find_map(|entry| {
            let token = entry.value();
            (token.runtime_id == runtime.id
                && token.plan_hash.as_str() == runtime.plan_hash.as_deref().unwrap_or_default()
                && token.binding_hash == binding
                && token.status_at(now) == TokenState::Issued)
                .then(|| token.clone())
        });
        match existing {
            Some(token) => Ok(token),
            None => self.issue(action, runtime),
        }
    }

    /// Consume a token. Succeeds exactly once per token; racing consumers
    /// serialize on the registry shard, so one wins and one gets
    /// "already consumed".
    pub fn consume(&self, token_id: &TokenId, tenant: &TenantId) -> Result<()> {
        let Some(mut entry) = self.tokens.get_mut(token_id) else {
            return Err(WardenError::TokenNotFound {
                token_id: token_id.to_string(),
            });
        };
        self.check_tenant(&entry.tenant, tenant)?;

        match entry.status() {
            TokenState::Consumed => Err(WardenError::TokenConsumed {
                token_id: token_id.to_string(),
            }),
            TokenState::Revoked => Err(WardenError::TokenRevoked {
                token_id: token_id.to_string(),
            }),
            TokenState::Expired => {
                self.audit.record(AuditEvent::new(
                    entry.tenant.clone(),
                    Some(entry.runtime_id),
                    AuditEventKind::TokenExpiredOnUse {
                        token_id: token_id.to_string(),
                    },
                ));
                Err(WardenError::AuthorityExpired {
                    token_id: token_id.to_string(),
                })
            }
            TokenState::Issued => {
                entry.state = TokenState::Consumed;
                info!(token_id = %token_id, "authority token consumed");
                self.audit.record(AuditEvent::new(
                    entry.tenant.clone(),
                    Some(entry.runtime_id),
                    AuditEventKind::TokenConsumed {
                        token_id: token_id.to_string(),
                    },
                ));
                Ok(())
            }
        }
    }

    /// Revoke a token. Idempotent: already-revoked and already-consumed
    /// tokens are a no-op so cascading revocation is safe to repeat.
    pub fn revoke(&self, token_id: &TokenId, tenant: &TenantId) -> Result<()> {
        let Some(mut entry) = self.tokens.get_mut(token_id) else {
            return Err(WardenError::TokenNotFound {
                token_id: token_id.to_string(),
            });
        };
        self.check_tenant(&entry.tenant, tenant)?;

        if entry.state == TokenState::Issued {
            entry.state = TokenState::Revoked;
            info!(token_id = %token_id, "authority token revoked");
            self.audit.record(AuditEvent::new(
                entry.tenant.clone(),
                Some(entry.runtime_id),
                AuditEventKind::TokenRevoked {
                    token_id: token_id.to_string(),
                },
            ));
        }
        Ok(())
    }

    /// Explicit cascade command: revoke every ISSUED token under a
    /// runtime instance, returning what was revoked. Idempotent.
    pub fn revoke_all_for_runtime(&self, runtime_id: &RuntimeId) -> Vec<TokenId> {
        let mut revoked = Vec::new();
        for mut entry in self.tokens.iter_mut() {
            if entry.runtime_id == *runtime_id && entry.state == TokenState::Issued {
                entry.state = TokenState::Revoked;
                revoked.push(entry.id);
                self.audit.record(AuditEvent::new(
                    entry.tenant.clone(),
                    Some(entry.runtime_id),
                    AuditEventKind::TokenRevoked {
                        token_id: entry.id.to_string(),
                    },
                ));
            }
        }
        if !revoked.is_empty() {
            info!(runtime_id = %runtime_id, count = revoked.len(), "cascading token revocation");
        }
        revoked
    }

    /// Look up a token by id
    pub fn get(&self, token_id: &TokenId) -> Result<AuthorityToken> {
        self.tokens
            .get(token_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| WardenError::TokenNotFound {
                token_id: token_id.to_string(),
            })
    }

    /// Effective state of a token at the current time
    pub fn status(&self, token_id: &TokenId) -> Result<TokenState> {
        Ok(self.get(token_id)?.status())
    }

    fn check_tenant(&self, expected: &TenantId, actual: &TenantId) -> Result<()> {
        if self.config.tenant_isolation && expected != actual {
            return Err(WardenError::TenantMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}
