//! Warden Provenance - Trust labels on data
//!
//! Every datum that may influence an authority decision carries a
//! `ProvenanceLabel`. Labels form a total order by trust, and combining
//! two labels always yields the less-trusted one, so trust can only
//! degrade as data flows through the agent.
//!
//! # Invariants
//!
//! 1. `combine` is commutative, associative, and monotonically
//!    non-increasing in trust
//! 2. `ExternalUntrusted` data may never produce or approve authority

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust classification attached to actions and decision inputs.
///
/// Ordered from most trusted to least trusted. The derived `Ord` follows
/// declaration order, so `System < AgentInternal < ... < ExternalUntrusted`
/// reads as "lower means more trusted".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvenanceLabel {
    /// Produced by the runtime itself (transition tables, config)
    System,
    /// Produced by the agent's own deterministic logic
    AgentInternal,
    /// External input from a vetted source (signed manifests, approved APIs)
    ExternalTrusted,
    /// External input with no trust guarantees (web content, tool output)
    ExternalUntrusted,
}

impl ProvenanceLabel {
    /// Combine two labels, keeping the least-trusted of the pair
    pub fn combine(self, other: ProvenanceLabel) -> ProvenanceLabel {
        self.max(other)
    }

    /// Whether data with this label may participate in authority issuance
    pub fn permits_authority(self) -> bool {
        self <= ProvenanceLabel::ExternalTrusted
    }

    /// Whether data with this label may participate in intent/plan
    /// acceptance or escalation approval
    pub fn permits_approval(self) -> bool {
        self <= ProvenanceLabel::ExternalTrusted
    }

    /// Stable wire name, matching the serde representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::AgentInternal => "AGENT_INTERNAL",
            Self::ExternalTrusted => "EXTERNAL_TRUSTED",
            Self::ExternalUntrusted => "EXTERNAL_UNTRUSTED",
        }
    }
}

impl fmt::Display for ProvenanceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combine an arbitrary set of labels, keeping the least-trusted.
///
/// An empty set combines to `System`: no external datum participated.
pub fn combine_all<I: IntoIterator<Item = ProvenanceLabel>>(labels: I) -> ProvenanceLabel {
    labels
        .into_iter()
        .fold(ProvenanceLabel::System, ProvenanceLabel::combine)
}
