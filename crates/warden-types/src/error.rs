//! Error types for Warden
//!
//! Error kinds are closed and typed, one per violated invariant. The core
//! never downgrades a deny, an illegal transition, or a provenance
//! violation into a warning; every error carries enough structure for the
//! audit collaborator to persist it verbatim.

use thiserror::Error;
use warden_provenance::ProvenanceLabel;

/// Result type for Warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

/// Warden error types
#[derive(Debug, Clone, Error)]
pub enum WardenError {
    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// Structured input failed validation (hard reject, all violations listed)
    #[error("Validation failed for {entity}: {}", violations.join("; "))]
    Validation {
        entity: String,
        violations: Vec<String>,
    },

    /// Policy document failed validation at load time
    #[error("Policy load failed: {}", violations.join("; "))]
    PolicyLoad { violations: Vec<String> },

    // ========================================================================
    // Decision Errors
    // ========================================================================

    /// Policy (or escalation) explicitly denied the action
    #[error("Action {action_id} denied: {reason}")]
    PolicyDeny { action_id: String, reason: String },

    /// Action requires escalation approval before authority may be issued
    #[error("Action {action_id} requires escalation: {reason}")]
    EscalationRequired { action_id: String, reason: String },

    // ========================================================================
    // Authority Errors
    // ========================================================================

    /// Token is past its expiration timestamp
    #[error("Authority token {token_id} has expired")]
    AuthorityExpired { token_id: String },

    /// Token has already been consumed (tokens are single-use)
    #[error("Authority token {token_id} has already been consumed")]
    TokenConsumed { token_id: String },

    /// Token has been revoked
    #[error("Authority token {token_id} has been revoked")]
    TokenRevoked { token_id: String },

    /// Token not present in the registry
    #[error("Authority token {token_id} not found")]
    TokenNotFound { token_id: String },

    /// Execution attempted without valid authority
    #[error("Unauthorized action: {reason}")]
    Unauthorized { reason: String },

    // ========================================================================
    // Security Violations
    // ========================================================================

    /// Illegal runtime state transition
    #[error("Illegal state transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    /// Provenance rules violated (untrusted data reached an authority path)
    #[error("Provenance violation in {context}: label {label} may not produce authority")]
    ProvenanceViolation {
        label: ProvenanceLabel,
        context: String,
    },

    /// Tenant isolation violated
    #[error("Tenant mismatch: expected {expected}, got {actual}")]
    TenantMismatch { expected: String, actual: String },

    /// Approved plan content no longer matches its frozen hash
    #[error("Plan {plan_id} mutated after approval: hash {actual} does not match {expected}")]
    PlanMutation {
        plan_id: String,
        expected: String,
        actual: String,
    },

    /// Content hash verification failed
    #[error("Hash verification failed for {entity}: {actual} does not match {expected}")]
    HashMismatch {
        entity: String,
        expected: String,
        actual: String,
    },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Internal error (serialization and similar infrastructure failures)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl WardenError {
    /// Create a validation error
    pub fn validation(entity: impl Into<String>, violations: Vec<String>) -> Self {
        Self::Validation {
            entity: entity.into(),
            violations,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Security-relevant errors force the owning runtime toward an aborted
    /// state and cascade token revocation
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::IllegalTransition { .. }
                | Self::ProvenanceViolation { .. }
                | Self::TenantMismatch { .. }
                | Self::PlanMutation { .. }
                | Self::HashMismatch { .. }
        )
    }

    /// Get a stable error code for audit records
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::PolicyLoad { .. } => "POLICY_LOAD_FAILED",
            Self::PolicyDeny { .. } => "POLICY_DENY",
            Self::EscalationRequired { .. } => "ESCALATION_REQUIRED",
            Self::AuthorityExpired { .. } => "AUTHORITY_EXPIRED",
            Self::TokenConsumed { .. } => "TOKEN_CONSUMED",
            Self::TokenRevoked { .. } => "TOKEN_REVOKED",
            Self::TokenNotFound { .. } => "TOKEN_NOT_FOUND",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            Self::ProvenanceViolation { .. } => "PROVENANCE_VIOLATION",
            Self::TenantMismatch { .. } => "TENANT_MISMATCH",
            Self::PlanMutation { .. } => "PLAN_MUTATION",
            Self::HashMismatch { .. } => "HASH_MISMATCH",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
