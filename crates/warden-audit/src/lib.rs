//! Warden Audit - Structured events produced by the enforcement core
//!
//! The core emits one event per state transition, token lifecycle event
//! and execution attempt. Events are append-only from the core's point
//! of view; durable storage is an external collaborator consuming the
//! [`AuditSink`] trait.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use warden_types::{AuditEventId, RuntimeId, TenantId};

/// Kinds of auditable events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventKind {
    /// Runtime moved between states
    StateTransition { from: String, to: String },
    /// Authority token issued
    TokenIssued { token_id: String, action_kind: String },
    /// Authority token consumed (exactly once per token)
    TokenConsumed { token_id: String },
    /// Authority token revoked
    TokenRevoked { token_id: String },
    /// Expired token rejected at the moment of use
    TokenExpiredOnUse { token_id: String },
    /// Policy decision taken for an action
    PolicyDecision { action_id: String, outcome: String, rule_id: String },
    /// Escalation requested for an action
    EscalationRequested { action_id: String, reason: String },
    /// Escalation resolved by the bound resolver
    EscalationResolved { action_id: String, decision: String },
    /// One pass through the enforcement gate
    ExecutionAttempt { action_id: String, success: bool },
    /// A security-relevant invariant was violated
    SecurityViolation { code: String, detail: String },
}

/// One audit event; never mutated by the core after emission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event id
    pub id: AuditEventId,
    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
    /// Owning tenant
    pub tenant: TenantId,
    /// Runtime instance the event belongs to, when there is one
    pub runtime_id: Option<RuntimeId>,
    /// What happened
    pub kind: AuditEventKind,
    /// Structured detail for the persistence collaborator
    pub detail: serde_json::Value,
}

impl AuditEvent {
    /// Create an event stamped with the current time
    pub fn new(tenant: TenantId, runtime_id: Option<RuntimeId>, kind: AuditEventKind) -> Self {
        Self {
            id: AuditEventId::new(),
            timestamp: Utc::now(),
            tenant,
            runtime_id,
            kind,
            detail: serde_json::Value::Null,
        }
    }

    /// Attach structured detail
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Consumer of audit events. `record` must not block on external I/O;
/// a durable sink buffers here and persists elsewhere.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Sink that drops everything (hosts that audit elsewhere)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Append-only in-memory log, suitable for tests and short-lived runs
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, oldest first
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Take everything recorded so far, leaving the log empty. Hosts that
    /// persist in batches drain on their own schedule.
    pub fn drain(&self) -> Vec<AuditEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether anything has been recorded
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}
