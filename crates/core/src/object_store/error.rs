use thiserror::Error;

/// Errors that can occur during object store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObjectStoreError {
    #[error("Object not found: {bucket}/{name}")]
    NotFound { bucket: String, name: String },
    #[error("Invalid object name: {0}")]
    InvalidName(String),
    #[error("Object store I/O failed: {0}")]
    Io(String),
    #[error("Object metadata error: {0}")]
    Metadata(String),
}

/// Result type for object store operations.
pub type Result<T> = std::result::Result<T, ObjectStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = ObjectStoreError::NotFound {
            bucket: "strata-snapshots".to_string(),
            name: "snapshots/snapshot-20250114-103000.json".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Object not found: strata-snapshots/snapshots/snapshot-20250114-103000.json"
        );
    }

    #[test]
    fn test_invalid_name_display() {
        let error = ObjectStoreError::InvalidName("../escape".to_string());
        assert_eq!(error.to_string(), "Invalid object name: ../escape");
    }
}
