//! Warden Runtime - Deterministic lifecycle for one executing plan
//!
//! Tracks a single execution's lifecycle through a static transition
//! table. The set of transitions any instance actually performs is a
//! subset of that table; everything else is rejected with a typed error.

pub mod instance;
pub mod state;

pub use instance::{RuntimeInstance, TransitionRecord};
pub use state::{can_execute, can_issue_authority, is_valid_transition, RuntimeState};
