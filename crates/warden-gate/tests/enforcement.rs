use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde_json::json;

use warden_audit::{AuditEventKind, InMemoryAuditLog};
use warden_authority::AuthorityManager;
use warden_escalation::{
    EscalationRequest, EscalationResolver, EscalationResult,
};
use warden_gate::{ActionHandler, HandlerOutcome, OrchestratorConfig, RuntimeOrchestrator};
use warden_policy::{Policy, PolicyEngine, PolicyOutcome};
use warden_runtime::RuntimeState;
use warden_types::{
    Action, EnforcementMode, Intent, Plan, ProvenanceLabel, Result, RuntimeConfig, RuntimeId,
    TenantId, TokenState,
};

/// Handler that succeeds for everything except "flaky_tool" and counts
/// its invocations.
struct TestHandler {
    invocations: AtomicUsize,
}

impl TestHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            invocations: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionHandler for TestHandler {
    async fn handle(&self, action: &Action) -> HandlerOutcome {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if action.kind == "flaky_tool" {
            HandlerOutcome::Failure("tool exploded".to_string())
        } else {
            HandlerOutcome::Success(json!({"kind": action.kind}))
        }
    }
}

/// Handler that revokes its own runtime's tokens mid-invocation, so the
/// post-handler consume fails.
struct SelfRevokingHandler {
    authority: OnceLock<Arc<AuthorityManager>>,
    runtime_id: OnceLock<RuntimeId>,
}

impl SelfRevokingHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            authority: OnceLock::new(),
            runtime_id: OnceLock::new(),
        })
    }
}

#[async_trait]
impl ActionHandler for SelfRevokingHandler {
    async fn handle(&self, _action: &Action) -> HandlerOutcome {
        if let (Some(authority), Some(runtime_id)) = (self.authority.get(), self.runtime_id.get())
        {
            authority.revoke_all_for_runtime(runtime_id);
        }
        HandlerOutcome::Success(json!({"ok": true}))
    }
}

struct ApproveAllResolver;

#[async_trait]
impl EscalationResolver for ApproveAllResolver {
    async fn resolve(&self, _request: EscalationRequest) -> Result<EscalationResult> {
        Ok(EscalationResult::approve("operator approved"))
    }
}

struct StalledResolver;

#[async_trait]
impl EscalationResolver for StalledResolver {
    async fn resolve(&self, _request: EscalationRequest) -> Result<EscalationResult> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(EscalationResult::approve("too late"))
    }
}

fn policy_engine() -> Arc<PolicyEngine> {
    let policy = Policy::from_value(json!({
        "name": "agent-tools",
        "version": "1.0",
        "rules": [
            {"id": "allow-read", "kind": "read_file", "outcome": "ALLOW"},
            {"id": "allow-flaky", "kind": "flaky_tool", "outcome": "ALLOW"},
            {"id": "escalate-email", "kind": "send_email", "outcome": "ESCALATE",
             "reason": "outbound email needs approval"}
        ],
        "default_outcome": "DENY"
    }))
    .unwrap();
    Arc::new(PolicyEngine::new(policy).unwrap())
}

struct Fixture {
    orchestrator: RuntimeOrchestrator,
    handler: Arc<TestHandler>,
    audit: Arc<InMemoryAuditLog>,
}

fn fixture(resolver: Arc<dyn EscalationResolver>, config: RuntimeConfig) -> Fixture {
    let handler = TestHandler::new();
    let audit = Arc::new(InMemoryAuditLog::new());
    let orchestrator = RuntimeOrchestrator::new(
        OrchestratorConfig::new(TenantId::from("acme"), policy_engine(), handler.clone())
            .with_resolver(resolver)
            .with_audit(audit.clone())
            .with_config(config),
    )
    .unwrap();
    Fixture {
        orchestrator,
        handler,
        audit,
    }
}

fn default_fixture() -> Fixture {
    fixture(
        Arc::new(warden_escalation::DefaultDenyResolver),
        RuntimeConfig::default(),
    )
}

/// Bind an intent, approve a three-step plan, and move to EXECUTING.
fn arm(orchestrator: &mut RuntimeOrchestrator) {
    let intent = Intent::new(
        "handle-inbox",
        "Read the inbox summary and act on it",
        vec!["no destructive operations".to_string()],
        TenantId::from("acme"),
    )
    .unwrap();
    let mut plan = Plan::for_intent(&intent);
    let mut params = BTreeMap::new();
    params.insert("path".to_string(), json!("/data/inbox.md"));
    plan.add_step("read_file", params).unwrap();
    plan.add_step("send_email", BTreeMap::new()).unwrap();
    plan.add_step("flaky_tool", BTreeMap::new()).unwrap();

    orchestrator
        .bind_intent(intent, ProvenanceLabel::ExternalTrusted)
        .unwrap();
    orchestrator
        .approve_plan(plan, ProvenanceLabel::ExternalTrusted)
        .unwrap();
    orchestrator.authorize().unwrap();
    orchestrator.begin_execution().unwrap();
}

#[tokio::test]
async fn test_allowed_step_executes_and_consumes_token() {
    let mut fx = default_fixture();
    arm(&mut fx.orchestrator);

    let result = fx
        .orchestrator
        .execute_step(0, ProvenanceLabel::ExternalTrusted)
        .await
        .unwrap();

    assert_eq!(result.decision, PolicyOutcome::Allow);
    assert!(result.escalation_outcome.is_none());
    assert!(result.success);
    assert_eq!(result.output, Some(json!({"kind": "read_file"})));
    assert_eq!(fx.handler.count(), 1);

    let token_id = result.token_id.unwrap();
    assert_eq!(
        fx.orchestrator.authority().status(&token_id).unwrap(),
        TokenState::Consumed
    );
}

#[tokio::test]
async fn test_denied_action_never_touches_a_token() {
    let mut fx = default_fixture();
    arm(&mut fx.orchestrator);

    let action = Action::new(
        "delete_file",
        BTreeMap::new(),
        ProvenanceLabel::ExternalTrusted,
        TenantId::from("acme"),
    )
    .unwrap();
    let err = fx.orchestrator.execute_action(&action).await.unwrap_err();

    assert_eq!(err.error_code(), "POLICY_DENY");
    assert_eq!(fx.handler.count(), 0);
    assert!(!fx
        .audit
        .events()
        .iter()
        .any(|e| matches!(e.kind, AuditEventKind::TokenIssued { .. })));
    // Policy deny is not a security violation: the runtime stays live.
    assert_eq!(fx.orchestrator.runtime().state(), RuntimeState::Executing);
}

#[tokio::test]
async fn test_default_deny_resolver_blocks_escalation() {
    let mut fx = default_fixture();
    arm(&mut fx.orchestrator);

    let err = fx
        .orchestrator
        .execute_step(1, ProvenanceLabel::ExternalTrusted)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "POLICY_DENY");
    assert_eq!(fx.handler.count(), 0);
    // The runtime stays ESCALATED until the caller decides otherwise.
    assert_eq!(fx.orchestrator.runtime().state(), RuntimeState::Escalated);

    fx.orchestrator.resume_execution().unwrap();
    assert_eq!(fx.orchestrator.runtime().state(), RuntimeState::Executing);
}

#[tokio::test]
async fn test_approved_escalation_executes_with_trail() {
    let mut fx = fixture(Arc::new(ApproveAllResolver), RuntimeConfig::default());
    arm(&mut fx.orchestrator);

    let result = fx
        .orchestrator
        .execute_step(1, ProvenanceLabel::ExternalTrusted)
        .await
        .unwrap();

    assert_eq!(result.decision, PolicyOutcome::Escalate);
    assert_eq!(
        result.escalation_outcome,
        Some(warden_escalation::EscalationDecision::Approve)
    );
    assert!(result.success);
    assert_eq!(fx.orchestrator.runtime().state(), RuntimeState::Executing);

    let token_id = result.token_id.unwrap();
    assert_eq!(
        fx.orchestrator.authority().status(&token_id).unwrap(),
        TokenState::Consumed
    );
}

#[tokio::test]
async fn test_resolver_timeout_is_a_deny() {
    let mut fx = fixture(
        Arc::new(StalledResolver),
        RuntimeConfig {
            escalation_timeout_secs: 1,
            ..Default::default()
        },
    );
    arm(&mut fx.orchestrator);

    let err = fx
        .orchestrator
        .execute_step(1, ProvenanceLabel::ExternalTrusted)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "POLICY_DENY");
    assert_eq!(fx.handler.count(), 0);
    assert_eq!(fx.orchestrator.runtime().state(), RuntimeState::Escalated);
}

#[tokio::test]
async fn test_handler_failure_still_consumes_token() {
    let mut fx = default_fixture();
    arm(&mut fx.orchestrator);

    let result = fx
        .orchestrator
        .execute_step(2, ProvenanceLabel::ExternalTrusted)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.detail.as_deref(), Some("tool exploded"));
    assert_eq!(fx.handler.count(), 1);
    assert_eq!(
        fx.orchestrator
            .authority()
            .status(&result.token_id.unwrap())
            .unwrap(),
        TokenState::Consumed
    );
}

#[tokio::test]
async fn test_untrusted_provenance_aborts_in_strict_mode() {
    let mut fx = default_fixture();
    arm(&mut fx.orchestrator);

    let err = fx
        .orchestrator
        .execute_step(0, ProvenanceLabel::ExternalUntrusted)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "PROVENANCE_VIOLATION");
    assert_eq!(fx.handler.count(), 0);
    assert_eq!(fx.orchestrator.runtime().state(), RuntimeState::Aborted);
    assert!(fx
        .audit
        .events()
        .iter()
        .any(|e| matches!(&e.kind, AuditEventKind::SecurityViolation { code, .. }
            if code == "PROVENANCE_VIOLATION")));
}

#[tokio::test]
async fn test_permissive_mode_raises_but_keeps_runtime_alive() {
    let mut fx = fixture(
        Arc::new(warden_escalation::DefaultDenyResolver),
        RuntimeConfig {
            mode: EnforcementMode::Permissive,
            ..Default::default()
        },
    );
    arm(&mut fx.orchestrator);

    let err = fx
        .orchestrator
        .execute_step(0, ProvenanceLabel::ExternalUntrusted)
        .await
        .unwrap_err();

    // Same error, smaller blast radius.
    assert_eq!(err.error_code(), "PROVENANCE_VIOLATION");
    assert_eq!(fx.orchestrator.runtime().state(), RuntimeState::Executing);

    let result = fx
        .orchestrator
        .execute_step(0, ProvenanceLabel::ExternalTrusted)
        .await
        .unwrap();
    assert!(result.success);
}

#[tokio::test]
async fn test_tenant_mismatch_aborts_and_revokes() {
    let mut fx = default_fixture();
    arm(&mut fx.orchestrator);

    // Leave one live token behind so the cascade has something to do.
    let action = Action::new(
        "read_file",
        BTreeMap::new(),
        ProvenanceLabel::ExternalTrusted,
        TenantId::from("acme"),
    )
    .unwrap();
    let token = fx
        .orchestrator
        .authority()
        .issue(&action, fx.orchestrator.runtime())
        .unwrap();

    let foreign = Action::new(
        "read_file",
        BTreeMap::new(),
        ProvenanceLabel::ExternalTrusted,
        TenantId::from("rival"),
    )
    .unwrap();
    let err = fx.orchestrator.execute_action(&foreign).await.unwrap_err();

    assert_eq!(err.error_code(), "TENANT_MISMATCH");
    assert_eq!(fx.orchestrator.runtime().state(), RuntimeState::Aborted);
    assert_eq!(
        fx.orchestrator.authority().status(&token.id).unwrap(),
        TokenState::Revoked
    );
}

#[tokio::test]
async fn test_execution_requires_executing_state() {
    let mut fx = default_fixture();
    // No arm(): the runtime is still CREATED.
    let action = Action::new(
        "read_file",
        BTreeMap::new(),
        ProvenanceLabel::ExternalTrusted,
        TenantId::from("acme"),
    )
    .unwrap();
    let err = fx.orchestrator.execute_action(&action).await.unwrap_err();
    assert_eq!(err.error_code(), "ILLEGAL_TRANSITION");
    assert_eq!(fx.orchestrator.runtime().state(), RuntimeState::Created);
}

#[tokio::test]
async fn test_abort_revokes_every_outstanding_token() {
    let mut fx = default_fixture();
    arm(&mut fx.orchestrator);

    let mut tokens = Vec::new();
    for _ in 0..3 {
        let mut params = BTreeMap::new();
        params.insert("path".to_string(), json!(format!("/data/{}", tokens.len())));
        let action = Action::new(
            "read_file",
            params,
            ProvenanceLabel::ExternalTrusted,
            TenantId::from("acme"),
        )
        .unwrap();
        tokens.push(
            fx.orchestrator
                .authority()
                .issue(&action, fx.orchestrator.runtime())
                .unwrap(),
        );
    }

    let revoked = fx.orchestrator.abort().unwrap();
    assert_eq!(revoked, 3);
    assert_eq!(fx.orchestrator.runtime().state(), RuntimeState::Aborted);
    for token in &tokens {
        let err = fx
            .orchestrator
            .authority()
            .consume(&token.id, &TenantId::from("acme"))
            .unwrap_err();
        assert_eq!(err.error_code(), "TOKEN_REVOKED");
    }

    // Terminal states absorb: a second abort is an illegal transition.
    assert!(fx.orchestrator.abort().is_err());
}

#[tokio::test]
async fn test_untrusted_source_cannot_bind_intent() {
    let mut fx = default_fixture();
    let intent = Intent::new("g", "o", vec![], TenantId::from("acme")).unwrap();
    let err = fx
        .orchestrator
        .bind_intent(intent, ProvenanceLabel::ExternalUntrusted)
        .unwrap_err();
    assert_eq!(err.error_code(), "PROVENANCE_VIOLATION");
    assert_eq!(fx.orchestrator.runtime().state(), RuntimeState::Created);
}

#[tokio::test]
async fn test_audit_trail_covers_the_whole_attempt() {
    let mut fx = default_fixture();
    arm(&mut fx.orchestrator);
    fx.orchestrator
        .execute_step(0, ProvenanceLabel::ExternalTrusted)
        .await
        .unwrap();

    let events = fx.audit.events();
    let has = |pred: &dyn Fn(&AuditEventKind) -> bool| events.iter().any(|e| pred(&e.kind));

    assert!(has(&|k| matches!(k, AuditEventKind::StateTransition { to, .. } if to == "EXECUTING")));
    assert!(has(&|k| matches!(k, AuditEventKind::PolicyDecision { outcome, .. } if outcome == "ALLOW")));
    assert!(has(&|k| matches!(k, AuditEventKind::TokenIssued { .. })));
    assert!(has(&|k| matches!(k, AuditEventKind::TokenConsumed { .. })));
    assert!(has(&|k| matches!(k, AuditEventKind::ExecutionAttempt { success, .. } if *success)));
}

#[tokio::test]
async fn test_zero_ttl_config_rejected_at_construction() {
    let err = RuntimeOrchestrator::new(
        OrchestratorConfig::new(TenantId::from("acme"), policy_engine(), TestHandler::new())
            .with_config(RuntimeConfig {
                default_token_ttl_secs: 0,
                ..Default::default()
            }),
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_attempt_audited_even_when_consume_fails() {
    let handler = SelfRevokingHandler::new();
    let audit = Arc::new(InMemoryAuditLog::new());
    let mut orchestrator = RuntimeOrchestrator::new(
        OrchestratorConfig::new(TenantId::from("acme"), policy_engine(), handler.clone())
            .with_audit(audit.clone()),
    )
    .unwrap();
    let _ = handler.authority.set(Arc::clone(orchestrator.authority()));
    let _ = handler.runtime_id.set(orchestrator.runtime().id);
    arm(&mut orchestrator);

    let err = orchestrator
        .execute_step(0, ProvenanceLabel::ExternalTrusted)
        .await
        .unwrap_err();

    // The consume failure surfaces, but the attempt stays on record.
    assert_eq!(err.error_code(), "TOKEN_REVOKED");
    assert!(audit
        .events()
        .iter()
        .any(|e| matches!(&e.kind, AuditEventKind::ExecutionAttempt { success, .. } if *success)));
}

#[tokio::test]
async fn test_replaying_a_step_issues_a_fresh_token() {
    let mut fx = default_fixture();
    arm(&mut fx.orchestrator);

    let first = fx
        .orchestrator
        .execute_step(0, ProvenanceLabel::ExternalTrusted)
        .await
        .unwrap();
    let second = fx
        .orchestrator
        .execute_step(0, ProvenanceLabel::ExternalTrusted)
        .await
        .unwrap();

    // The first token was consumed, so the binding gets a new one.
    assert_ne!(first.token_id, second.token_id);
    assert!(second.success);
}
