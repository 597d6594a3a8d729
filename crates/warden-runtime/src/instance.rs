//! Runtime instance: one state variable per executing plan
//!
//! A `RuntimeInstance` is owned exclusively by the orchestrator that
//! created it; other components reference it by id. Callers serialize
//! access through that single owner, so transitions on one instance
//! never race.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use warden_types::{Result, RuntimeId, TenantId, WardenError};

use crate::state::{is_valid_transition, RuntimeState};

/// One recorded transition, kept for audit, never consulted for control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: RuntimeState,
    pub to: RuntimeState,
    pub at: DateTime<Utc>,
}

/// State of one executing plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeInstance {
    /// Unique runtime id
    pub id: RuntimeId,
    /// Owning tenant
    pub tenant: TenantId,
    /// Current state (exactly one at any time)
    state: RuntimeState,
    /// Content hash of the bound intent, once bound
    pub intent_hash: Option<String>,
    /// Frozen hash of the approved plan, once approved
    pub plan_hash: Option<String>,
    /// History of accepted transitions
    history: Vec<TransitionRecord>,
}

impl RuntimeInstance {
    /// Create a fresh runtime in `Created`
    pub fn new(tenant: TenantId) -> Self {
        Self {
            id: RuntimeId::new(),
            tenant,
            state: RuntimeState::Created,
            intent_hash: None,
            plan_hash: None,
            history: Vec::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// Accepted transitions so far, oldest first
    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// Attempt a transition. Illegal transitions return the typed error
    /// carrying both states and leave the instance untouched.
    pub fn transition(&mut self, to: RuntimeState) -> Result<()> {
        if !is_valid_transition(self.state, to) {
            warn!(
                runtime_id = %self.id,
                from = %self.state,
                to = %to,
                "illegal runtime transition rejected"
            );
            return Err(WardenError::IllegalTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.history.push(TransitionRecord {
            from: self.state,
            to,
            at: Utc::now(),
        });
        self.state = to;
        Ok(())
    }

    /// Bind the accepted intent's content hash and move to `IntentBound`
    pub fn bind_intent(&mut self, intent_hash: impl Into<String>) -> Result<()> {
        self.transition(RuntimeState::IntentBound)?;
        self.intent_hash = Some(intent_hash.into());
        Ok(())
    }

    /// Bind the approved plan's frozen hash and move to `PlanApproved`
    pub fn bind_plan(&mut self, plan_hash: impl Into<String>) -> Result<()> {
        if self.intent_hash.is_none() {
            return Err(WardenError::validation(
                "runtime",
                vec!["cannot bind a plan before an intent is bound".to_string()],
            ));
        }
        self.transition(RuntimeState::PlanApproved)?;
        self.plan_hash = Some(plan_hash.into());
        Ok(())
    }
}
