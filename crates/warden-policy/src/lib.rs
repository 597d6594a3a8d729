//! Warden Policy - Deterministic policy decision engine
//!
//! Maps action kinds (and optional parameter predicates) to ALLOW, DENY
//! or ESCALATE. Policies are validated once at load, fail closed, and are
//! immutable afterwards; evaluation is pure and replayable.

pub mod document;
pub mod engine;

pub use document::{ParamPredicate, Policy, PolicyOutcome, PolicyRule};
pub use engine::{PolicyDecision, PolicyEngine, DEFAULT_RULE_ID};
