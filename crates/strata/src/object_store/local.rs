//! Filesystem-backed object store.
//!
//! Layout on disk:
//!
//! ```text
//! <root>/<bucket>/<name>
//! <root>/<bucket>/<name>.metadata.json
//! ```
//!
//! Objects are written to a temporary sibling and renamed into place, so a
//! reader never observes a partially written file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use strata_core::object_store::{
    validate_object_name, ObjectStore, ObjectStoreError, Result, StoredObject,
};

const METADATA_SUFFIX: &str = ".metadata.json";
const TEMP_MARKER: &str = ".tmp-";

/// Sidecar written next to every object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectSidecar {
    content_type: String,
    uploaded_at: DateTime<Utc>,
    size_bytes: u64,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

fn io_error(context: &str, err: std::io::Error) -> ObjectStoreError {
    ObjectStoreError::Io(format!("{context}: {err}"))
}

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| io_error("create root", e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(ObjectStoreError::InvalidName(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, name: &str) -> Result<PathBuf> {
        validate_object_name(name)?;
        let mut path = self.bucket_dir(bucket)?;
        for part in name.split('/') {
            path.push(part);
        }
        Ok(path)
    }

    async fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ObjectStoreError::InvalidName(path.display().to_string()))?;
        let temp = path.with_file_name(format!("{file_name}{TEMP_MARKER}{}", Uuid::new_v4()));

        if let Err(err) = fs::write(&temp, data).await {
            let _ = fs::remove_file(&temp).await;
            return Err(io_error("write object", err));
        }
        if let Err(err) = fs::rename(&temp, path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(io_error("rename object", err));
        }
        Ok(())
    }
}

fn sidecar_path(object_path: &Path) -> PathBuf {
    let mut os = object_path.as_os_str().to_owned();
    os.push(METADATA_SUFFIX);
    PathBuf::from(os)
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        if name.ends_with(METADATA_SUFFIX) || name.contains(TEMP_MARKER) {
            return Err(ObjectStoreError::InvalidName(name.to_string()));
        }
        let path = self.object_path(bucket, name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create directory", e))?;
        }

        let sidecar = ObjectSidecar {
            content_type: content_type.to_string(),
            uploaded_at: Utc::now(),
            size_bytes: data.len() as u64,
            metadata,
        };
        let sidecar_bytes = serde_json::to_vec_pretty(&sidecar)
            .map_err(|e| ObjectStoreError::Metadata(e.to_string()))?;

        // Sidecar first: a listed object always has its metadata.
        Self::write_atomically(&sidecar_path(&path), &sidecar_bytes).await?;
        Self::write_atomically(&path, &data).await?;

        tracing::trace!(bucket, name, size = data.len(), "stored object");
        Ok(())
    }

    async fn download(&self, bucket: &str, name: &str) -> Result<StoredObject> {
        let path = self.object_path(bucket, name)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObjectStoreError::NotFound {
                    bucket: bucket.to_string(),
                    name: name.to_string(),
                });
            }
            Err(err) => return Err(io_error("read object", err)),
        };

        let (content_type, metadata) = match fs::read(sidecar_path(&path)).await {
            Ok(bytes) => {
                let sidecar: ObjectSidecar = serde_json::from_slice(&bytes)
                    .map_err(|e| ObjectStoreError::Metadata(e.to_string()))?;
                (sidecar.content_type, sidecar.metadata)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                ("application/octet-stream".to_string(), HashMap::new())
            }
            Err(err) => return Err(io_error("read metadata", err)),
        };

        Ok(StoredObject {
            data,
            content_type,
            metadata,
        })
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let bucket_dir = self.bucket_dir(bucket)?;
        let mut names = Vec::new();
        let mut pending = vec![(bucket_dir, String::new())];

        while let Some((dir, relative)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(io_error("list directory", err)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| io_error("list directory", e))?
            {
                let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                let name = if relative.is_empty() {
                    file_name.clone()
                } else {
                    format!("{relative}/{file_name}")
                };

                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| io_error("stat entry", e))?;
                if file_type.is_dir() {
                    pending.push((entry.path(), name));
                } else if !file_name.ends_with(METADATA_SUFFIX)
                    && !file_name.contains(TEMP_MARKER)
                    && name.starts_with(prefix)
                {
                    names.push(name);
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<()> {
        let path = self.object_path(bucket, name)?;
        for target in [path.clone(), sidecar_path(&path)] {
            match fs::remove_file(&target).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(io_error("delete object", err)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, LocalObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("objects")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_upload_writes_object_and_sidecar() {
        let (_dir, store) = store().await;
        let metadata = HashMap::from([("groupsCount".to_string(), "3".to_string())]);

        store
            .upload(
                "bucket",
                "snapshots/snapshot-20250114-103000.json",
                b"{\"a\":1}".to_vec(),
                "application/json",
                metadata,
            )
            .await
            .unwrap();

        let object_path = store
            .root()
            .join("bucket/snapshots/snapshot-20250114-103000.json");
        assert!(object_path.exists());
        assert!(sidecar_path(&object_path).exists());

        let object = store
            .download("bucket", "snapshots/snapshot-20250114-103000.json")
            .await
            .unwrap();
        assert_eq!(object.data, b"{\"a\":1}");
        assert_eq!(object.content_type, "application/json");
        assert_eq!(object.metadata["groupsCount"], "3");
    }

    #[tokio::test]
    async fn test_list_skips_sidecars_and_filters_prefix() {
        let (_dir, store) = store().await;
        for name in [
            "snapshots/snapshot-20250101-000000.json",
            "snapshots/snapshot-all-20250101-000000.json",
            "archive/snapshot-20240101-000000.json",
        ] {
            store
                .upload("bucket", name, b"{}".to_vec(), "application/json", HashMap::new())
                .await
                .unwrap();
        }

        let names = store.list("bucket", "snapshots/snapshot-").await.unwrap();

        assert_eq!(
            names,
            vec![
                "snapshots/snapshot-20250101-000000.json".to_string(),
                "snapshots/snapshot-all-20250101-000000.json".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_missing_bucket_is_empty() {
        let (_dir, store) = store().await;
        assert!(store.list("nothing-here", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let (_dir, store) = store().await;
        assert!(matches!(
            store.download("bucket", "missing.json").await,
            Err(ObjectStoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_both_files() {
        let (_dir, store) = store().await;
        store
            .upload("bucket", "a.json", b"{}".to_vec(), "application/json", HashMap::new())
            .await
            .unwrap();

        store.delete("bucket", "a.json").await.unwrap();
        store.delete("bucket", "a.json").await.unwrap();

        assert!(!store.root().join("bucket/a.json").exists());
        assert!(!store.root().join("bucket/a.json.metadata.json").exists());
    }

    #[tokio::test]
    async fn test_rejects_escaping_names() {
        let (_dir, store) = store().await;

        for (bucket, name) in [("bucket", "../escape.json"), ("..", "a.json"), ("a/b", "a.json")] {
            let result = store
                .upload(bucket, name, Vec::new(), "application/json", HashMap::new())
                .await;
            assert!(
                matches!(result, Err(ObjectStoreError::InvalidName(_))),
                "{bucket}/{name} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_rejects_reserved_suffix() {
        let (_dir, store) = store().await;
        let result = store
            .upload(
                "bucket",
                "a.json.metadata.json",
                Vec::new(),
                "application/json",
                HashMap::new(),
            )
            .await;
        assert!(matches!(result, Err(ObjectStoreError::InvalidName(_))));
    }
}
