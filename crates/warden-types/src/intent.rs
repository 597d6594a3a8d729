//! Intent types for Warden
//!
//! An Intent is the immutable statement of what the agent wants to
//! accomplish. Once accepted it is content-hashed; any revision produces
//! a new Intent and invalidates everything downstream (plan, tokens).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WardenError};
use crate::hash::hash_object;
use crate::identity::{IntentId, TenantId};

/// The immutable statement of what the agent wants to accomplish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Unique intent ID
    pub id: IntentId,
    /// Goal identifier (stable, machine-oriented)
    pub goal: String,
    /// Free-form objective
    pub objective: String,
    /// Declared constraints on any plan realizing this intent
    pub constraints: Vec<String>,
    /// Owning tenant
    pub tenant: TenantId,
    /// When the intent was accepted
    pub created_at: DateTime<Utc>,
    /// Content hash over the canonical serialization
    pub content_hash: String,
}

/// Fields covered by the content hash. The id is derived identity, not
/// content, so it stays out of the digest.
#[derive(Serialize)]
struct IntentDigest<'a> {
    goal: &'a str,
    objective: &'a str,
    constraints: &'a [String],
    tenant: &'a str,
    created_at: String,
}

impl Intent {
    /// Accept a new intent, validating and hashing it
    pub fn new(
        goal: impl Into<String>,
        objective: impl Into<String>,
        constraints: Vec<String>,
        tenant: TenantId,
    ) -> Result<Self> {
        let goal = goal.into();
        let objective = objective.into();

        let mut violations = Vec::new();
        if goal.is_empty() {
            violations.push("goal must not be empty".to_string());
        }
        if objective.is_empty() {
            violations.push("objective must not be empty".to_string());
        }
        if tenant.is_empty() {
            violations.push("tenant must not be empty".to_string());
        }
        for (i, c) in constraints.iter().enumerate() {
            if c.is_empty() {
                violations.push(format!("constraint {} must not be empty", i));
            }
        }
        if !violations.is_empty() {
            return Err(WardenError::validation("intent", violations));
        }

        let created_at = Utc::now();
        let content_hash = hash_object(&IntentDigest {
            goal: &goal,
            objective: &objective,
            constraints: &constraints,
            tenant: tenant.as_str(),
            created_at: created_at.to_rfc3339(),
        })?;

        Ok(Self {
            id: IntentId::new(),
            goal,
            objective,
            constraints,
            tenant,
            created_at,
            content_hash,
        })
    }

    /// Recompute the content hash from current field values
    pub fn compute_hash(&self) -> Result<String> {
        hash_object(&IntentDigest {
            goal: &self.goal,
            objective: &self.objective,
            constraints: &self.constraints,
            tenant: self.tenant.as_str(),
            created_at: self.created_at.to_rfc3339(),
        })
    }

    /// Verify the stored hash against the current content.
    ///
    /// A mismatch means the intent was mutated after acceptance, which is
    /// a security violation for the owning runtime.
    pub fn verify_hash(&self) -> Result<()> {
        let actual = self.compute_hash()?;
        if actual != self.content_hash {
            return Err(WardenError::HashMismatch {
                entity: format!("intent {}", self.id),
                expected: self.content_hash.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Produce a revised intent. The original is untouched; the revision
    /// is a new Intent with a new id and hash, so all downstream artifacts
    /// bound to the original hash become invalid.
    pub fn revise(
        &self,
        objective: impl Into<String>,
        constraints: Vec<String>,
    ) -> Result<Intent> {
        Intent::new(self.goal.clone(), objective, constraints, self.tenant.clone())
    }
}
