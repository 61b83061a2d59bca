//! Shared test doubles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use strata_core::cache::{Cache, CacheError};
use strata_core::events::{DomainEvent, EventHandler, HandlerError};
use strata_core::object_store::{ObjectStore, ObjectStoreError, StoredObject};
use strata_core::snapshot::{Category, Group, Item};
use strata_core::storage::{RepositoryError, SnapshotRepository};

use crate::storage::InMemoryRepository;

/// One active group with an inactive item plus one inactive group.
pub fn sample_groups() -> Vec<Group> {
    vec![
        Group::new(1, "Language", 1).with_categories(vec![Category::new(10, "Speaking", 1)
            .with_items(vec![
                Item::new(100, "Babbles", 1),
                Item::new(101, "Names objects", 2).inactive(),
            ])]),
        Group::new(2, "Retired", 2).inactive(),
    ]
}

/// Repository wrapper counting `load_groups` calls.
#[derive(Debug, Clone, Default)]
pub struct CountingRepository {
    pub inner: InMemoryRepository,
    pub loads: Arc<AtomicUsize>,
    pub delay: Option<Duration>,
}

impl CountingRepository {
    pub fn new(groups: Vec<Group>) -> Self {
        Self {
            inner: InMemoryRepository::with_groups(groups),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotRepository for CountingRepository {
    async fn load_groups(&self, include_inactive: bool) -> strata_core::storage::Result<Vec<Group>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.load_groups(include_inactive).await
    }
}

#[derive(Debug, Default)]
pub struct FailingRepository;

#[async_trait]
impl SnapshotRepository for FailingRepository {
    async fn load_groups(&self, _include_inactive: bool) -> strata_core::storage::Result<Vec<Group>> {
        Err(RepositoryError::ConnectionFailed("database offline".to_string()))
    }
}

#[derive(Debug, Default)]
pub struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> strata_core::cache::Result<Option<Vec<u8>>> {
        Err(CacheError::ConnectionFailed("cache offline".to_string()))
    }

    async fn set(
        &self,
        _key: &str,
        _value: &[u8],
        _ttl: Option<Duration>,
    ) -> strata_core::cache::Result<()> {
        Err(CacheError::ConnectionFailed("cache offline".to_string()))
    }

    async fn delete(&self, _key: &str) -> strata_core::cache::Result<()> {
        Err(CacheError::ConnectionFailed("cache offline".to_string()))
    }

    async fn delete_pattern(&self, _pattern: &str) -> strata_core::cache::Result<()> {
        Err(CacheError::ConnectionFailed("cache offline".to_string()))
    }
}

#[derive(Debug, Default)]
pub struct FailingObjectStore;

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn upload(
        &self,
        _bucket: &str,
        _name: &str,
        _data: Vec<u8>,
        _content_type: &str,
        _metadata: HashMap<String, String>,
    ) -> strata_core::object_store::Result<()> {
        Err(ObjectStoreError::Io("bucket unreachable".to_string()))
    }

    async fn download(
        &self,
        _bucket: &str,
        _name: &str,
    ) -> strata_core::object_store::Result<StoredObject> {
        Err(ObjectStoreError::Io("bucket unreachable".to_string()))
    }

    async fn list(
        &self,
        _bucket: &str,
        _prefix: &str,
    ) -> strata_core::object_store::Result<Vec<String>> {
        Err(ObjectStoreError::Io("bucket unreachable".to_string()))
    }

    async fn delete(&self, _bucket: &str, _name: &str) -> strata_core::object_store::Result<()> {
        Err(ObjectStoreError::Io("bucket unreachable".to_string()))
    }
}

/// Handler recording every event it sees, optionally failing.
pub struct RecordingHandler {
    name: String,
    fail: bool,
    pub calls: AtomicUsize,
    pub seen: tokio::sync::Mutex<Vec<DomainEvent>>,
    pub log: Option<Arc<std::sync::Mutex<Vec<String>>>>,
}

impl RecordingHandler {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
            seen: tokio::sync::Mutex::new(Vec::new()),
            log: None,
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    /// Appends the handler name to a shared log on every call.
    pub fn logging_to(mut self, log: Arc<std::sync::Mutex<Vec<String>>>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().unwrap().push(self.name.clone());
        }
        self.seen.lock().await.push(event.clone());
        if self.fail {
            return Err(HandlerError::new(format!("{} refused", self.name)));
        }
        Ok(())
    }
}
