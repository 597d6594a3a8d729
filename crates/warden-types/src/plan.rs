//! Plan types for Warden
//!
//! A Plan is an ordered sequence of steps realizing an intent. It is
//! mutable only before approval; approval computes the plan hash and
//! freezes it. Any mutation detected after approval is a security
//! violation that the orchestrator answers with abort-and-revoke.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, WardenError};
use crate::hash::hash_object;
use crate::identity::{PlanId, TenantId};
use crate::intent::Intent;

/// One step of a plan: an action template plus its position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Position in the plan (contiguous from 0)
    pub index: usize,
    /// Action kind this step will request (e.g. "read_file")
    pub action_kind: String,
    /// Parameter bindings for the action
    pub params: BTreeMap<String, serde_json::Value>,
}

/// An ordered sequence of steps realizing an intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan ID
    pub id: PlanId,
    /// Content hash of the intent this plan realizes
    pub intent_hash: String,
    /// Owning tenant
    pub tenant: TenantId,
    /// Ordered steps
    pub steps: Vec<PlanStep>,
    /// When the plan was created
    pub created_at: DateTime<Utc>,
    /// When the plan was approved, if it was
    pub approved_at: Option<DateTime<Utc>>,
    /// Hash frozen at approval time
    pub plan_hash: Option<String>,
}

/// Fields covered by the plan hash
#[derive(Serialize)]
struct PlanDigest<'a> {
    intent_hash: &'a str,
    tenant: &'a str,
    steps: &'a [PlanStep],
}

impl Plan {
    /// Create an empty plan bound to an intent
    pub fn for_intent(intent: &Intent) -> Self {
        Self {
            id: PlanId::new(),
            intent_hash: intent.content_hash.clone(),
            tenant: intent.tenant.clone(),
            steps: Vec::new(),
            created_at: Utc::now(),
            approved_at: None,
            plan_hash: None,
        }
    }

    /// Whether the plan has been approved and frozen
    pub fn is_approved(&self) -> bool {
        self.plan_hash.is_some()
    }

    /// The frozen plan hash, if approved
    pub fn hash(&self) -> Option<&str> {
        self.plan_hash.as_deref()
    }

    /// Append a step. Fails once the plan is approved.
    pub fn add_step(
        &mut self,
        action_kind: impl Into<String>,
        params: BTreeMap<String, serde_json::Value>,
    ) -> Result<&PlanStep> {
        if let Some(expected) = &self.plan_hash {
            return Err(WardenError::PlanMutation {
                plan_id: self.id.to_string(),
                expected: expected.clone(),
                actual: "<structural mutation attempted>".to_string(),
            });
        }
        let action_kind = action_kind.into();
        if action_kind.is_empty() {
            return Err(WardenError::validation(
                "plan step",
                vec!["action_kind must not be empty".to_string()],
            ));
        }
        let step = PlanStep {
            index: self.steps.len(),
            action_kind,
            params,
        };
        self.steps.push(step);
        Ok(self.steps.last().unwrap())
    }

    /// Approve the plan: validate structure, compute the hash, freeze.
    ///
    /// Returns the frozen hash. Approving twice fails.
    pub fn approve(&mut self) -> Result<String> {
        if self.is_approved() {
            return Err(WardenError::validation(
                "plan",
                vec!["plan is already approved".to_string()],
            ));
        }

        let mut violations = Vec::new();
        if self.steps.is_empty() {
            violations.push("plan must contain at least one step".to_string());
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.index != i {
                violations.push(format!("step {} has index {}", i, step.index));
            }
            if step.action_kind.is_empty() {
                violations.push(format!("step {} action_kind must not be empty", i));
            }
        }
        if !violations.is_empty() {
            return Err(WardenError::validation("plan", violations));
        }

        let hash = self.compute_hash()?;
        self.plan_hash = Some(hash.clone());
        self.approved_at = Some(Utc::now());
        Ok(hash)
    }

    /// Recompute the hash over current content
    pub fn compute_hash(&self) -> Result<String> {
        hash_object(&PlanDigest {
            intent_hash: &self.intent_hash,
            tenant: self.tenant.as_str(),
            steps: &self.steps,
        })
    }

    /// Verify the frozen hash against current content.
    ///
    /// A mismatch means the plan was mutated after approval. Callers must
    /// treat this as a security violation: abort the runtime and revoke
    /// every token issued under this plan.
    pub fn verify_integrity(&self) -> Result<()> {
        let Some(expected) = &self.plan_hash else {
            return Err(WardenError::validation(
                "plan",
                vec!["plan has not been approved".to_string()],
            ));
        };
        let actual = self.compute_hash()?;
        if &actual != expected {
            return Err(WardenError::PlanMutation {
                plan_id: self.id.to_string(),
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Get a step by position
    pub fn step(&self, index: usize) -> Option<&PlanStep> {
        self.steps.get(index)
    }
}
