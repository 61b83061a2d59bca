//! Pure functions for converting snapshots to and from cache bytes.
//!
//! Values are stored as compact JSON so a cache entry can be inspected with
//! `redis-cli GET` when debugging.

use thiserror::Error;

use crate::snapshot::Snapshot;

/// Errors that can occur during cache serialization/deserialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Failed to serialize: {0}")]
    SerializeFailed(String),
    #[error("Failed to deserialize: {0}")]
    DeserializeFailed(String),
}

pub type Result<T> = std::result::Result<T, SerializationError>;

pub fn serialize_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>> {
    serde_json::to_vec(snapshot).map_err(|e| SerializationError::SerializeFailed(e.to_string()))
}

/// Decodes cache bytes into a snapshot, re-applying the canonical ordering.
pub fn deserialize_snapshot(bytes: &[u8]) -> Result<Snapshot> {
    let snapshot: Snapshot = serde_json::from_slice(bytes)
        .map_err(|e| SerializationError::DeserializeFailed(e.to_string()))?;
    Ok(Snapshot::new(snapshot.groups().to_vec()))
}
