//! Runtime orchestrator
//!
//! Owns one `RuntimeInstance` end to end: binds the intent, approves and
//! freezes the plan, walks it through the executable states, runs steps
//! through the enforcement gate, and owns the abort cascade.

use std::sync::Arc;

use tracing::info;

use warden_audit::{AuditEvent, AuditEventKind, AuditSink, NullAuditSink};
use warden_authority::AuthorityManager;
use warden_escalation::{DefaultDenyResolver, EscalationResolver};
use warden_policy::PolicyEngine;
use warden_provenance::ProvenanceLabel;
use warden_runtime::{RuntimeInstance, RuntimeState};
use warden_types::{
    Action, EnforcementMode, Intent, Plan, Result, RuntimeConfig, TenantId, WardenError,
};

use crate::gate::EnforcementGate;
use crate::handler::ActionHandler;
use crate::result::ExecutionResult;

/// Everything an orchestrator is wired with, read once at construction
pub struct OrchestratorConfig {
    pub tenant: TenantId,
    pub policy: Arc<PolicyEngine>,
    pub handler: Arc<dyn ActionHandler>,
    pub resolver: Arc<dyn EscalationResolver>,
    pub audit: Arc<dyn AuditSink>,
    pub config: RuntimeConfig,
}

impl OrchestratorConfig {
    /// Minimal wiring: fail-closed resolver, no audit persistence
    pub fn new(
        tenant: TenantId,
        policy: Arc<PolicyEngine>,
        handler: Arc<dyn ActionHandler>,
    ) -> Self {
        Self {
            tenant,
            policy,
            handler,
            resolver: Arc::new(DefaultDenyResolver),
            audit: Arc::new(NullAuditSink),
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn EscalationResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }
}

/// The exclusive owner of one runtime instance
pub struct RuntimeOrchestrator {
    runtime: RuntimeInstance,
    authority: Arc<AuthorityManager>,
    gate: EnforcementGate,
    audit: Arc<dyn AuditSink>,
    config: RuntimeConfig,
    intent: Option<Intent>,
    plan: Option<Plan>,
}

impl std::fmt::Debug for RuntimeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeOrchestrator").finish_non_exhaustive()
    }
}

impl RuntimeOrchestrator {
    pub fn new(wiring: OrchestratorConfig) -> Result<Self> {
        wiring.config.validate()?;
        let authority = Arc::new(AuthorityManager::new(
            Arc::clone(&wiring.policy),
            wiring.config.clone(),
            Arc::clone(&wiring.audit),
        )?);
        let gate = EnforcementGate::new(
            wiring.policy,
            Arc::clone(&authority),
            wiring.resolver,
            wiring.handler,
            Arc::clone(&wiring.audit),
            wiring.config.clone(),
        )?;
        Ok(Self {
            runtime: RuntimeInstance::new(wiring.tenant),
            authority,
            gate,
            audit: wiring.audit,
            config: wiring.config,
            intent: None,
            plan: None,
        })
    }

    /// The owned runtime instance (read-only; transitions go through
    /// orchestrator operations)
    pub fn runtime(&self) -> &RuntimeInstance {
        &self.runtime
    }

    /// The shared token registry
    pub fn authority(&self) -> &Arc<AuthorityManager> {
        &self.authority
    }

    /// The bound intent, once accepted
    pub fn intent(&self) -> Option<&Intent> {
        self.intent.as_ref()
    }

    /// The approved plan, once bound
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Accept an intent and bind its content hash to the runtime.
    ///
    /// `source` labels the channel the intent arrived on; untrusted
    /// input may never drive acceptance.
    pub fn bind_intent(&mut self, intent: Intent, source: ProvenanceLabel) -> Result<()> {
        self.check_approval_source(source, "intent acceptance")?;
        if self.config.tenant_isolation && intent.tenant != self.runtime.tenant {
            return Err(WardenError::TenantMismatch {
                expected: self.runtime.tenant.to_string(),
                actual: intent.tenant.to_string(),
            });
        }
        intent.verify_hash()?;
        self.runtime.bind_intent(intent.content_hash.clone())?;
        self.emit_transition();
        info!(runtime_id = %self.runtime.id, intent_id = %intent.id, "intent bound");
        self.intent = Some(intent);
        Ok(())
    }

    /// Approve a plan against the bound intent: freeze its hash and move
    /// the runtime to `PlanApproved`. Returns the frozen hash.
    pub fn approve_plan(&mut self, mut plan: Plan, source: ProvenanceLabel) -> Result<String> {
        self.check_approval_source(source, "plan approval")?;
        let Some(intent) = &self.intent else {
            return Err(WardenError::validation(
                "plan",
                vec!["no intent is bound to this runtime".to_string()],
            ));
        };
        if plan.intent_hash != intent.content_hash {
            return Err(WardenError::HashMismatch {
                entity: format!("plan {}", plan.id),
                expected: intent.content_hash.clone(),
                actual: plan.intent_hash.clone(),
            });
        }
        if self.config.tenant_isolation && plan.tenant != self.runtime.tenant {
            return Err(WardenError::TenantMismatch {
                expected: self.runtime.tenant.to_string(),
                actual: plan.tenant.to_string(),
            });
        }

        let hash = plan.approve()?;
        self.runtime.bind_plan(hash.clone())?;
        self.emit_transition();
        info!(runtime_id = %self.runtime.id, plan_id = %plan.id, plan_hash = %hash, "plan approved");
        self.plan = Some(plan);
        Ok(hash)
    }

    /// Move to `Authorized`: authority may now be issued
    pub fn authorize(&mut self) -> Result<()> {
        self.runtime.transition(RuntimeState::Authorized)?;
        self.emit_transition();
        Ok(())
    }

    /// Move to `Executing`: the gate will now accept actions
    pub fn begin_execution(&mut self) -> Result<()> {
        self.runtime.transition(RuntimeState::Executing)?;
        self.emit_transition();
        Ok(())
    }

    /// Return an escalated runtime to `Executing`. Never happens
    /// automatically after a resolver deny; this is the explicit caller
    /// decision the state machine requires.
    pub fn resume_execution(&mut self) -> Result<()> {
        self.runtime.transition(RuntimeState::Executing)?;
        self.emit_transition();
        Ok(())
    }

    /// Execute one step of the approved plan through the gate.
    ///
    /// Verifies plan integrity first: a plan mutated after approval
    /// aborts the runtime and revokes everything issued under it.
    pub async fn execute_step(
        &mut self,
        index: usize,
        provenance: ProvenanceLabel,
    ) -> Result<ExecutionResult> {
        let Some(plan) = &self.plan else {
            return Err(WardenError::validation(
                "plan",
                vec!["no approved plan is bound to this runtime".to_string()],
            ));
        };
        if let Err(err) = plan.verify_integrity() {
            self.quarantine(&err);
            return Err(err);
        }
        let Some(step) = plan.step(index) else {
            return Err(WardenError::validation(
                "plan step",
                vec![format!("plan has no step {}", index)],
            ));
        };
        let action = Action::from_step(step, provenance, self.runtime.tenant.clone())?;
        self.gate.execute(&action, &mut self.runtime).await
    }

    /// Execute an ad-hoc action through the gate (same mandatory
    /// sequence; the action still needs an approved plan for scoping)
    pub async fn execute_action(&mut self, action: &Action) -> Result<ExecutionResult> {
        self.gate.execute(action, &mut self.runtime).await
    }

    /// Finish successfully
    pub fn complete(&mut self) -> Result<()> {
        self.runtime.transition(RuntimeState::Completed)?;
        self.emit_transition();
        Ok(())
    }

    /// Explicit cascade: abort the runtime and revoke every token issued
    /// under it. Returns the number of tokens revoked.
    pub fn abort(&mut self) -> Result<usize> {
        self.terminate_into(RuntimeState::Aborted)
    }

    /// Like [`Self::abort`] but lands in `Terminated`
    pub fn terminate(&mut self) -> Result<usize> {
        self.terminate_into(RuntimeState::Terminated)
    }

    fn terminate_into(&mut self, state: RuntimeState) -> Result<usize> {
        self.runtime.transition(state)?;
        self.emit_transition();
        let revoked = self.authority.revoke_all_for_runtime(&self.runtime.id);
        info!(
            runtime_id = %self.runtime.id,
            state = %state,
            tokens_revoked = revoked.len(),
            "runtime terminated with cascade"
        );
        Ok(revoked.len())
    }

    fn check_approval_source(&self, source: ProvenanceLabel, context: &str) -> Result<()> {
        if !source.permits_approval() {
            return Err(WardenError::ProvenanceViolation {
                label: source,
                context: context.to_string(),
            });
        }
        Ok(())
    }

    fn quarantine(&mut self, err: &WardenError) {
        if self.config.mode != EnforcementMode::Strict || self.runtime.state().is_terminal() {
            return;
        }
        let _ = self.runtime.transition(RuntimeState::Aborted);
        self.emit_transition();
        let revoked = self.authority.revoke_all_for_runtime(&self.runtime.id);
        self.audit.record(
            AuditEvent::new(
                self.runtime.tenant.clone(),
                Some(self.runtime.id),
                AuditEventKind::SecurityViolation {
                    code: err.error_code().to_string(),
                    detail: err.to_string(),
                },
            )
            .with_detail(serde_json::json!({ "tokens_revoked": revoked.len() })),
        );
    }

    fn emit_transition(&self) {
        if let Some(record) = self.runtime.history().last() {
            self.audit.record(AuditEvent::new(
                self.runtime.tenant.clone(),
                Some(self.runtime.id),
                AuditEventKind::StateTransition {
                    from: record.from.to_string(),
                    to: record.to.to_string(),
                },
            ));
        }
    }
}
