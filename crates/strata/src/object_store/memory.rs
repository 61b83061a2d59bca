use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use strata_core::object_store::{
    validate_object_name, ObjectStore, ObjectStoreError, Result, StoredObject,
};

/// In-memory object store.
///
/// Objects are keyed by `(bucket, name)` and kept in name order so listings
/// are deterministic. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<(String, String), StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects across all buckets.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        validate_object_name(name)?;
        let object = StoredObject {
            data,
            content_type: content_type.to_string(),
            metadata,
        };
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), name.to_string()), object);
        Ok(())
    }

    async fn download(&self, bucket: &str, name: &str) -> Result<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            })
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().await;
        Ok(objects
            .keys()
            .filter(|(b, name)| b == bucket && name.starts_with(prefix))
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<()> {
        self.objects
            .write()
            .await
            .remove(&(bucket.to_string(), name.to_string()));
        Ok(())
    }
}
