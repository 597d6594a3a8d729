//! Policy documents
//!
//! A Policy is a named, versioned, ordered rule set with a declared
//! default outcome. It is validated once at load and treated as an
//! immutable value for the lifetime of any engine holding it. Malformed
//! policies fail closed at load time, never at evaluation time.

use serde::{Deserialize, Serialize};

use warden_types::{Result, WardenError};

/// Outcome of a policy rule or a whole decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyOutcome {
    Allow,
    Deny,
    Escalate,
}

impl PolicyOutcome {
    /// Stable wire name, matching the serde representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
            Self::Escalate => "ESCALATE",
        }
    }
}

impl std::fmt::Display for PolicyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter predicate: the action parameter `key` must equal `equals`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamPredicate {
    pub key: String,
    pub equals: serde_json::Value,
}

/// One policy rule, matched in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Rule id, unique within the policy
    pub id: String,
    /// Action-kind pattern: exact, `*`, or a `prefix.*` glob
    pub kind: String,
    /// Optional parameter predicates; all must hold for the rule to match
    #[serde(default)]
    pub params: Vec<ParamPredicate>,
    /// Outcome when the rule matches
    pub outcome: PolicyOutcome,
    /// Optional human-readable reason carried into the decision
    #[serde(default)]
    pub reason: Option<String>,
}

impl PolicyRule {
    /// Whether this rule's kind pattern matches an action kind
    pub fn matches_kind(&self, kind: &str) -> bool {
        if self.kind == "*" {
            return true;
        }
        if let Some(prefix) = self.kind.strip_suffix('*') {
            return kind.starts_with(prefix);
        }
        self.kind == kind
    }
}

/// A named, versioned, immutable rule set with a default outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy name
    pub name: String,
    /// Document version
    pub version: String,
    /// Rules, matched first to last
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    /// Outcome when no rule matches. Must be Deny or Escalate.
    pub default_outcome: PolicyOutcome,
}

impl Policy {
    /// Load a policy from an already-parsed declarative document.
    ///
    /// File parsing belongs to the host; this core only validates the
    /// document and fails closed with every violation listed.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let policy: Policy = serde_json::from_value(value).map_err(|e| WardenError::PolicyLoad {
            violations: vec![format!("document does not match policy schema: {}", e)],
        })?;
        policy.validate()?;
        Ok(policy)
    }

    /// Validate the policy. Hard reject with the full violation list.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();

        if self.name.is_empty() {
            violations.push("name must not be empty".to_string());
        }
        if self.version.is_empty() {
            violations.push("version must not be empty".to_string());
        }
        // Default-deny: a policy may never fall through to ALLOW.
        if self.default_outcome == PolicyOutcome::Allow {
            violations.push("default_outcome must be DENY or ESCALATE, never ALLOW".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.id.is_empty() {
                violations.push(format!("rule {} id must not be empty", i));
            } else if !seen.insert(rule.id.as_str()) {
                violations.push(format!("rule id '{}' is not unique", rule.id));
            }
            if rule.id == "default" {
                violations.push("rule id 'default' is reserved for the default outcome".to_string());
            }
            if rule.kind.is_empty() {
                violations.push(format!("rule '{}' kind pattern must not be empty", rule.id));
            }
            for pred in &rule.params {
                if pred.key.is_empty() {
                    violations.push(format!("rule '{}' has a predicate with an empty key", rule.id));
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(WardenError::PolicyLoad { violations })
        }
    }
}
