//! Configuration surface for Warden
//!
//! All configuration is read once at construction time. There is no hot
//! reload: changing enforcement behavior means building a new gate.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WardenError};

/// How the enforcement gate reacts to security violations.
///
/// Neither mode ever downgrades an error: a deny is a deny in both. The
/// difference is the blast radius of a security violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// A security violation aborts the runtime and revokes all its tokens
    Strict,
    /// Errors are raised but the runtime stays resumable (development only)
    Permissive,
}

impl Default for EnforcementMode {
    fn default() -> Self {
        Self::Strict
    }
}

/// Runtime configuration, read once at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Enforcement mode
    pub mode: EnforcementMode,
    /// Default authority token lifetime in seconds (bounded and positive;
    /// a token must outlive the issue-to-consume window of one attempt)
    pub default_token_ttl_secs: i64,
    /// Whether tenant isolation checks are enforced
    pub tenant_isolation: bool,
    /// Budget for one escalation resolver call; a timeout is a deny
    pub escalation_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: EnforcementMode::Strict,
            default_token_ttl_secs: 300,
            tenant_isolation: true,
            escalation_timeout_secs: 30,
        }
    }
}

impl RuntimeConfig {
    /// Validate the configuration (hard reject, all violations listed)
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();
        if self.default_token_ttl_secs < 1 {
            violations.push("default_token_ttl_secs must be positive".to_string());
        }
        if self.escalation_timeout_secs == 0 {
            violations.push("escalation_timeout_secs must be positive".to_string());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(WardenError::validation("config", violations))
        }
    }
}
