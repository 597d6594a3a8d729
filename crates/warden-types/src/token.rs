//! Authority token types for Warden
//!
//! An AuthorityToken is a single-use, time-bounded capability authorizing
//! exactly one action binding. `Expired` is derived from the clock at the
//! moment of use, never stored; `Consumed` and `Revoked` are terminal.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{RuntimeId, TenantId, TokenId};

/// Lifecycle state of an authority token.
///
/// `Expired` is only ever produced by [`AuthorityToken::status`]; the
/// stored state remains whatever it was when the clock ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenState {
    Issued,
    Consumed,
    Revoked,
    Expired,
}

/// A single-use, expiring capability token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityToken {
    /// Unique token ID
    pub id: TokenId,
    /// Action kind this token authorizes
    pub action_kind: String,
    /// Hash of the exact (kind, params, tenant) binding authorized
    pub binding_hash: String,
    /// Owning tenant
    pub tenant: TenantId,
    /// When the token was issued
    pub issued_at: DateTime<Utc>,
    /// When the token expires (always bounded)
    pub expires_at: DateTime<Utc>,
    /// Stored lifecycle state (never `Expired`)
    pub state: TokenState,
    /// Plan hash under which this token was issued
    pub plan_hash: String,
    /// Runtime instance that authorized this token
    pub runtime_id: RuntimeId,
}

impl AuthorityToken {
    /// Issue a fresh token with a bounded lifetime
    pub fn issue(
        action_kind: impl Into<String>,
        binding_hash: impl Into<String>,
        tenant: TenantId,
        plan_hash: impl Into<String>,
        runtime_id: RuntimeId,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TokenId::new(),
            action_kind: action_kind.into(),
            binding_hash: binding_hash.into(),
            tenant,
            issued_at: now,
            expires_at: now + ttl,
            state: TokenState::Issued,
            plan_hash: plan_hash.into(),
            runtime_id,
        }
    }

    /// Whether the token is past its expiration at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Effective state at `now`: an issued token past expiry reports
    /// `Expired` without ever being explicitly revoked
    pub fn status_at(&self, now: DateTime<Utc>) -> TokenState {
        match self.state {
            TokenState::Issued if self.is_expired_at(now) => TokenState::Expired,
            state => state,
        }
    }

    /// Effective state at the current time
    pub fn status(&self) -> TokenState {
        self.status_at(Utc::now())
    }
}
