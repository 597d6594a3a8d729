//! Warden Types - Canonical domain types for the authorization runtime
//!
//! This crate contains the data model shared by every warden crate:
//!
//! - Identity types (IntentId, PlanId, TokenId, RuntimeId, TenantId, ...)
//! - Intent, Plan and Action with content hashing
//! - AuthorityToken with derived expiry
//! - Runtime configuration
//! - The closed error enum, one variant per violated invariant
//!
//! # Architectural Invariants
//!
//! 1. Intents and approved plans are immutable; mutation is detected by
//!    hash verification and treated as a security violation
//! 2. Authority tokens are single-use and always expire
//! 3. Every error is self-describing and carries a stable error code

pub mod action;
pub mod config;
pub mod error;
pub mod hash;
pub mod identity;
pub mod intent;
pub mod plan;
pub mod token;

pub use action::*;
pub use config::*;
pub use error::*;
pub use hash::*;
pub use identity::*;
pub use intent::*;
pub use plan::*;
pub use token::*;

// Labels are attached data on actions, so the label type travels with the
// type crate even though the combination rules live in warden-provenance.
pub use warden_provenance::ProvenanceLabel;
