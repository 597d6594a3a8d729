//! Action types for Warden
//!
//! An Action is the smallest unit of requested authority: one concrete
//! attempted operation carrying provenance and tenant. Actions are
//! constructed fresh per execution attempt and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use warden_provenance::ProvenanceLabel;

use crate::error::{Result, WardenError};
use crate::hash::hash_object;
use crate::identity::{ActionId, TenantId};
use crate::plan::PlanStep;

/// One concrete attempted operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique id for this execution attempt
    pub id: ActionId,
    /// Action kind (e.g. "read_file")
    pub kind: String,
    /// Parameter bindings (keys unique by construction)
    pub params: BTreeMap<String, serde_json::Value>,
    /// Trust label of the data that shaped this action
    pub provenance: ProvenanceLabel,
    /// Owning tenant
    pub tenant: TenantId,
    /// Originating plan step, if the action came from a plan
    pub plan_step: Option<usize>,
}

/// Fields identifying the authority binding of an action. Tokens are
/// scoped to exactly this binding, never reused across different ones.
#[derive(Serialize)]
struct BindingDigest<'a> {
    kind: &'a str,
    params: &'a BTreeMap<String, serde_json::Value>,
    tenant: &'a str,
}

impl Action {
    /// Construct and validate an action
    pub fn new(
        kind: impl Into<String>,
        params: BTreeMap<String, serde_json::Value>,
        provenance: ProvenanceLabel,
        tenant: TenantId,
    ) -> Result<Self> {
        let kind = kind.into();
        let mut violations = Vec::new();
        if kind.is_empty() {
            violations.push("kind must not be empty".to_string());
        }
        if tenant.is_empty() {
            violations.push("tenant must not be empty".to_string());
        }
        if params.keys().any(|k| k.is_empty()) {
            violations.push("parameter keys must not be empty".to_string());
        }
        if !violations.is_empty() {
            return Err(WardenError::validation("action", violations));
        }
        Ok(Self {
            id: ActionId::new(),
            kind,
            params,
            provenance,
            tenant,
            plan_step: None,
        })
    }

    /// Construct an action from an approved plan step
    pub fn from_step(
        step: &PlanStep,
        provenance: ProvenanceLabel,
        tenant: TenantId,
    ) -> Result<Self> {
        let mut action = Self::new(step.action_kind.clone(), step.params.clone(), provenance, tenant)?;
        action.plan_step = Some(step.index);
        Ok(action)
    }

    /// Hash of the (kind, params, tenant) binding this action requests
    pub fn binding_hash(&self) -> Result<String> {
        hash_object(&BindingDigest {
            kind: &self.kind,
            params: &self.params,
            tenant: self.tenant.as_str(),
        })
    }
}
