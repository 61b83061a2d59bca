use std::collections::HashMap;

use async_trait::async_trait;

use super::{ObjectStoreError, Result};

/// Content type written for snapshot files.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// An object plus the metadata it was uploaded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

/// Blob storage addressed by `(bucket, name)`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores an object, replacing any previous object with the same name.
    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<()>;

    /// Fetches an object. Missing objects are `ObjectStoreError::NotFound`.
    async fn download(&self, bucket: &str, name: &str) -> Result<StoredObject>;

    /// Names of every object in `bucket` starting with `prefix`.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Removes an object. Deleting a missing object is not an error.
    async fn delete(&self, bucket: &str, name: &str) -> Result<()>;
}

/// Rejects names that could escape the bucket when mapped onto a filesystem.
pub fn validate_object_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if invalid {
        return Err(ObjectStoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_object_name("snapshot-20250114-103000.json").is_ok());
        assert!(validate_object_name("snapshots/snapshot-20250114-103000.json").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "/abs.json", "a/../b.json", "a//b.json", "./a.json", "a\\b.json"] {
            assert_eq!(
                validate_object_name(name),
                Err(ObjectStoreError::InvalidName(name.to_string())),
                "{name:?} should be rejected"
            );
        }
    }
}
