use thiserror::Error;

use crate::storage::RepositoryError;

/// Errors produced while encoding or decoding a snapshot file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotFileError {
    #[error("Failed to encode snapshot file: {0}")]
    Encode(String),
    #[error("Failed to decode snapshot file: {0}")]
    Decode(String),
    #[error("Unsupported snapshot schema version: {0}")]
    UnsupportedSchema(String),
    #[error("Snapshot node {id} is nested deeper than three levels")]
    TooDeep { id: i64 },
}

/// Errors surfaced by the snapshot read path.
///
/// Cache and object store failures degrade to a miss; only the repository
/// tier can fail a read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Repository unavailable: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result type for snapshot reads.
pub type Result<T> = std::result::Result<T, SnapshotError>;
