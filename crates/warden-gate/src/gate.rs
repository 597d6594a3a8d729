//! The enforcement gate
//!
//! The sole executor entry point. Every tool invocation in the system
//! flows through [`EnforcementGate::execute`]; there is no other path by
//! which a token is consumed and an action runs.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tracing::{info, warn};

use warden_audit::{AuditEvent, AuditEventKind, AuditSink};
use warden_authority::AuthorityManager;
use warden_escalation::{EscalationDecision, EscalationRequest, EscalationResolver};
use warden_policy::{PolicyEngine, PolicyOutcome};
use warden_runtime::{can_execute, RuntimeInstance, RuntimeState};
use warden_types::{Action, EnforcementMode, Result, RuntimeConfig, WardenError};

use crate::handler::{ActionHandler, HandlerOutcome};
use crate::result::ExecutionResult;

/// Validates, decides, executes and consumes - in that order, always
pub struct EnforcementGate {
    policy: Arc<PolicyEngine>,
    authority: Arc<AuthorityManager>,
    resolver: Arc<dyn EscalationResolver>,
    handler: Arc<dyn ActionHandler>,
    audit: Arc<dyn AuditSink>,
    config: RuntimeConfig,
}

impl EnforcementGate {
    pub fn new(
        policy: Arc<PolicyEngine>,
        authority: Arc<AuthorityManager>,
        resolver: Arc<dyn EscalationResolver>,
        handler: Arc<dyn ActionHandler>,
        audit: Arc<dyn AuditSink>,
        config: RuntimeConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            policy,
            authority,
            resolver,
            handler,
            audit,
            config,
        })
    }

    /// Execute one action under a runtime instance.
    ///
    /// The mandatory sequence: state check, tenant check, policy
    /// decision, escalation if required, token issuance, exactly one
    /// handler invocation, token consumption on success and failure
    /// alike.
    pub async fn execute(
        &self,
        action: &Action,
        runtime: &mut RuntimeInstance,
    ) -> Result<ExecutionResult> {
        // 1. State gate. No implicit transition is attempted.
        if !can_execute(runtime.state()) {
            return Err(WardenError::IllegalTransition {
                from: runtime.state().to_string(),
                to: RuntimeState::Executing.to_string(),
            });
        }

        // 2. Tenant gate.
        if self.config.tenant_isolation && action.tenant != runtime.tenant {
            let err = WardenError::TenantMismatch {
                expected: runtime.tenant.to_string(),
                actual: action.tenant.to_string(),
            };
            self.quarantine(runtime, &err);
            return Err(err);
        }

        // 3. Policy decision.
        let decision = self.policy.evaluate(action);
        self.audit.record(AuditEvent::new(
            action.tenant.clone(),
            Some(runtime.id),
            AuditEventKind::PolicyDecision {
                action_id: action.id.to_string(),
                outcome: decision.outcome.to_string(),
                rule_id: decision.rule_id.clone(),
            },
        ));

        let mut escalation_outcome = None;
        match decision.outcome {
            // 4. Deny: no token is ever touched.
            PolicyOutcome::Deny => {
                return Err(WardenError::PolicyDeny {
                    action_id: action.id.to_string(),
                    reason: decision.reason,
                });
            }
            // 5. Escalate: consult the resolver under a deadline.
            PolicyOutcome::Escalate => {
                runtime.transition(RuntimeState::Escalated)?;
                self.emit_transition(runtime);
                self.audit.record(AuditEvent::new(
                    action.tenant.clone(),
                    Some(runtime.id),
                    AuditEventKind::EscalationRequested {
                        action_id: action.id.to_string(),
                        reason: decision.reason.clone(),
                    },
                ));

                let verdict = self.resolve_escalation(action, runtime, &decision.reason).await;
                self.audit.record(AuditEvent::new(
                    action.tenant.clone(),
                    Some(runtime.id),
                    AuditEventKind::EscalationResolved {
                        action_id: action.id.to_string(),
                        decision: verdict.0.to_string(),
                    },
                ));

                match verdict.0 {
                    // The runtime stays ESCALATED; only caller logic may
                    // return it to EXECUTING.
                    EscalationDecision::Deny => {
                        return Err(WardenError::PolicyDeny {
                            action_id: action.id.to_string(),
                            reason: verdict.1,
                        });
                    }
                    EscalationDecision::Approve => {
                        runtime.transition(RuntimeState::Executing)?;
                        self.emit_transition(runtime);
                        escalation_outcome = Some(EscalationDecision::Approve);
                    }
                }
            }
            PolicyOutcome::Allow => {}
        }

        // 6. Obtain authority. Approval never bypasses these checks.
        let token = match self.issue_token(action, runtime, escalation_outcome.is_some()) {
            Ok(token) => token,
            Err(err) => {
                self.quarantine(runtime, &err);
                return Err(err);
            }
        };

        // 7. Exactly one handler invocation, and only with live authority.
        //    A token that expired in flight means the handler never runs;
        //    consuming it here records the expiry and yields the error.
        if token.is_expired_at(Utc::now()) {
            return match self.authority.consume(&token.id, &action.tenant) {
                Ok(()) => Err(WardenError::AuthorityExpired {
                    token_id: token.id.to_string(),
                }),
                Err(err) => Err(err),
            };
        }
        let outcome = self.handler.handle(action).await;

        let (success, output, detail) = match outcome {
            HandlerOutcome::Success(value) => (true, Some(value), None),
            HandlerOutcome::Failure(message) => (false, None, Some(message)),
        };
        info!(
            action_id = %action.id,
            token_id = %token.id,
            success,
            "execution attempt finished"
        );
        // Audited before consumption: a failed consume must not lose the
        // record that the handler ran.
        self.audit.record(AuditEvent::new(
            action.tenant.clone(),
            Some(runtime.id),
            AuditEventKind::ExecutionAttempt {
                action_id: action.id.to_string(),
                success,
            },
        ));

        // 8. A token's validity window is "at most one execution
        // attempt", so consume no matter how the handler fared.
        self.authority.consume(&token.id, &action.tenant)?;

        // 9. The decision trail travels with the result.
        Ok(ExecutionResult {
            action_id: action.id,
            decision: decision.outcome,
            escalation_outcome,
            token_id: Some(token.id),
            success,
            detail,
            output,
            timestamp: Utc::now(),
        })
    }

    /// Issue a token for the allowed (or approved-after-escalation) path.
    ///
    /// After an approval the stored policy outcome is still ESCALATE, so
    /// the manager's own policy check would bounce it; every other check
    /// (state, provenance, tenant, binding scope) still applies.
    fn issue_token(
        &self,
        action: &Action,
        runtime: &RuntimeInstance,
        approved: bool,
    ) -> Result<warden_types::AuthorityToken> {
        match self.authority.issue_or_reuse(action, runtime) {
            Err(WardenError::EscalationRequired { .. }) if approved => {
                self.authority.issue_approved(action, runtime)
            }
            other => other,
        }
    }

    async fn resolve_escalation(
        &self,
        action: &Action,
        runtime: &RuntimeInstance,
        reason: &str,
    ) -> (EscalationDecision, String) {
        let request = EscalationRequest {
            action: action.clone(),
            reason: reason.to_string(),
            runtime_id: runtime.id,
            runtime_state: runtime.state(),
            tenant: action.tenant.clone(),
        };
        let deadline = StdDuration::from_secs(self.config.escalation_timeout_secs);

        match tokio::time::timeout(deadline, self.resolver.resolve(request)).await {
            Ok(Ok(result)) => (result.decision, result.reason),
            Ok(Err(err)) => {
                warn!(action_id = %action.id, error = %err, "escalation resolver failed; denying");
                (
                    EscalationDecision::Deny,
                    format!("escalation resolver failed: {}", err),
                )
            }
            // A timeout is a deny, never an implicit allow.
            Err(_) => {
                warn!(action_id = %action.id, "escalation resolver timed out; denying");
                (
                    EscalationDecision::Deny,
                    "escalation resolver timed out".to_string(),
                )
            }
        }
    }

    /// In strict mode a security violation leaves the runtime aborted
    /// with every one of its tokens revoked. Permissive mode raises the
    /// same error but keeps the instance resumable.
    fn quarantine(&self, runtime: &mut RuntimeInstance, err: &WardenError) {
        if self.config.mode != EnforcementMode::Strict
            || !err.is_security_violation()
            || runtime.state().is_terminal()
        {
            return;
        }
        warn!(runtime_id = %runtime.id, code = err.error_code(), "security violation: aborting runtime");
        let _ = runtime.transition(RuntimeState::Aborted);
        self.emit_transition(runtime);
        let revoked = self.authority.revoke_all_for_runtime(&runtime.id);
        self.audit.record(
            AuditEvent::new(
                runtime.tenant.clone(),
                Some(runtime.id),
                AuditEventKind::SecurityViolation {
                    code: err.error_code().to_string(),
                    detail: err.to_string(),
                },
            )
            .with_detail(serde_json::json!({ "tokens_revoked": revoked.len() })),
        );
    }

    fn emit_transition(&self, runtime: &RuntimeInstance) {
        if let Some(record) = runtime.history().last() {
            self.audit.record(AuditEvent::new(
                runtime.tenant.clone(),
                Some(runtime.id),
                AuditEventKind::StateTransition {
                    from: record.from.to_string(),
                    to: record.to.to_string(),
                },
            ));
        }
    }
}
