//! Content hashing for Warden
//!
//! Intents and plans are bound by SHA-256 hashes over their canonical
//! JSON serialization. Struct fields serialize in declaration order and
//! parameter maps are `BTreeMap`s, so the serialization is deterministic.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Result, WardenError};

/// Hash a serializable object to a hex-encoded SHA-256 digest
pub fn hash_object<T: Serialize>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| WardenError::internal(format!("canonical serialization failed: {}", e)))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
