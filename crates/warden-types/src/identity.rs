//! Identity types for Warden
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types. Tenants are external names,
//! so `TenantId` wraps a string instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id_type!(IntentId, "intent", "Unique identifier for an accepted intent");
define_id_type!(PlanId, "plan", "Unique identifier for a plan");
define_id_type!(ActionId, "action", "Unique identifier for one execution attempt");
define_id_type!(TokenId, "token", "Unique identifier for an authority token");
define_id_type!(RuntimeId, "rt", "Unique identifier for a runtime instance");
define_id_type!(AuditEventId, "audit", "Unique identifier for an audit event");

/// Tenant identifier.
///
/// The enforcement core only carries and compares tenants; storage-level
/// isolation belongs to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The tenant name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name is empty (rejected by validation)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_id_display_prefix() {
        let id = TokenId::new();
        assert!(id.to_string().starts_with("token_"));
    }

    #[test]
    fn test_id_parsing_roundtrip() {
        let id = RuntimeId::new();
        let parsed = RuntimeId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_tenant_equality() {
        assert_eq!(TenantId::from("acme"), TenantId::new("acme"));
        assert_ne!(TenantId::from("acme"), TenantId::from("other"));
    }
}
