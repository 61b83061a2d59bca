//! Three-tier snapshot read path.
//!
//! ```text
//! cache ──miss──▶ object store (latest version) ──miss──▶ repository
//!   ▲                     │                                  │
//!   └──── write-back ─────┴──────────────────────────────────┘
//!                                                            └──▶ export queue
//! ```
//!
//! Only the repository tier can fail a read. Cache and object store errors
//! are logged and treated as misses.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use strata_core::cache::{deserialize_snapshot, serialize_snapshot, Cache, CacheKeys};
use strata_core::object_store::{ObjectLayout, ObjectStore, Version};
use strata_core::snapshot::{Result, Snapshot, SnapshotFile, SnapshotView};
use strata_core::storage::SnapshotRepository;

use super::{ExportQueue, SnapshotExporter};

pub struct SnapshotService {
    cache: Arc<dyn Cache>,
    objects: Arc<dyn ObjectStore>,
    repository: Arc<dyn SnapshotRepository>,
    keys: CacheKeys,
    layout: ObjectLayout,
    ttl: Duration,
    exporter: Arc<SnapshotExporter>,
    exports: Option<Arc<ExportQueue>>,
    /// One cold-fill lock per view, indexed by `view_slot`.
    fill_locks: [Mutex<()>; 2],
}

fn view_slot(view: SnapshotView) -> usize {
    match view {
        SnapshotView::ActiveOnly => 0,
        SnapshotView::All => 1,
    }
}

impl SnapshotService {
    pub fn new(
        cache: Arc<dyn Cache>,
        objects: Arc<dyn ObjectStore>,
        repository: Arc<dyn SnapshotRepository>,
        keys: CacheKeys,
        layout: ObjectLayout,
        ttl: Duration,
    ) -> Self {
        let exporter = Arc::new(SnapshotExporter::new(
            repository.clone(),
            objects.clone(),
            cache.clone(),
            layout.clone(),
            keys.clone(),
            ttl,
        ));

        Self {
            cache,
            objects,
            repository,
            keys,
            layout,
            ttl,
            exporter,
            exports: None,
            fill_locks: [Mutex::new(()), Mutex::new(())],
        }
    }

    /// Sets the `source` written into exported files.
    ///
    /// Call before [`exporter`](Self::exporter) hands the exporter to a queue.
    pub fn with_export_source(mut self, source: impl Into<String>) -> Self {
        self.exporter = Arc::new(
            SnapshotExporter::new(
                self.repository.clone(),
                self.objects.clone(),
                self.cache.clone(),
                self.layout.clone(),
                self.keys.clone(),
                self.ttl,
            )
            .with_source(source),
        );
        self
    }

    /// Routes repository-fill exports through `queue`.
    pub fn with_export_queue(mut self, queue: Arc<ExportQueue>) -> Self {
        self.exports = Some(queue);
        self
    }

    /// Exporter sharing this service's tiers, for starting an [`ExportQueue`].
    pub fn exporter(&self) -> Arc<SnapshotExporter> {
        self.exporter.clone()
    }

    /// Resolves the snapshot for `view` through the tiers.
    #[instrument(skip(self), fields(view = %view))]
    pub async fn get_snapshot(&self, view: SnapshotView) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.read_cache(view).await {
            debug!(groups = snapshot.group_count(), "Snapshot served from cache");
            return Ok(Arc::new(snapshot));
        }

        let _fill = self.fill_locks[view_slot(view)].lock().await;

        // Another reader may have filled the cache while we waited.
        if let Some(snapshot) = self.read_cache(view).await {
            debug!("Snapshot filled by concurrent reader");
            return Ok(Arc::new(snapshot));
        }

        if let Some(snapshot) = self.read_object_store(view).await {
            self.write_cache(view, &snapshot).await;
            info!(
                groups = snapshot.group_count(),
                "Snapshot served from object store and cached"
            );
            return Ok(Arc::new(snapshot));
        }

        self.fill_from_repository(view).await
    }

    /// Drops every cached snapshot and version, then rebuilds both views from
    /// the repository. Returns the active view.
    ///
    /// Afterwards neither view is served from an object exported before the
    /// refresh.
    #[instrument(skip(self))]
    pub async fn refresh_snapshot(&self) -> Result<Arc<Snapshot>> {
        info!("Refreshing snapshot cache");

        let pattern = self.keys.snapshot_pattern();
        if let Err(e) = self.cache.delete_pattern(&pattern).await {
            warn!(error = %e, pattern = %pattern, "Failed to evict snapshot keys");
        }

        {
            let view = SnapshotView::All;
            let _fill = self.fill_locks[view_slot(view)].lock().await;
            self.fill_from_repository(view).await?;
        }

        let view = SnapshotView::ActiveOnly;
        let _fill = self.fill_locks[view_slot(view)].lock().await;
        self.fill_from_repository(view).await
    }

    /// Latest exported version of the active view.
    pub async fn get_version(&self) -> Option<Version> {
        self.get_version_for(SnapshotView::ActiveOnly).await
    }

    /// Latest exported version of `view`, or `None` when nothing was exported
    /// or no tier could answer.
    #[instrument(skip(self), fields(view = %view))]
    pub async fn get_version_for(&self, view: SnapshotView) -> Option<Version> {
        if let Some(version) = self.cached_version(view).await {
            return Some(version);
        }

        let version = self.listed_version(view).await?;
        if let Err(e) = self
            .cache
            .set(
                &self.keys.version(view),
                version.as_str().as_bytes(),
                Some(self.ttl),
            )
            .await
        {
            warn!(error = %e, "Failed to cache snapshot version");
        }
        Some(version)
    }

    /// Exports the active view immediately.
    pub async fn export_snapshot(&self) -> bool {
        self.exporter.export(SnapshotView::ActiveOnly).await
    }

    /// Exports `view` immediately.
    pub async fn export_view(&self, view: SnapshotView) -> bool {
        self.exporter.export(view).await
    }

    async fn fill_from_repository(&self, view: SnapshotView) -> Result<Arc<Snapshot>> {
        let groups = self
            .repository
            .load_groups(view.includes_inactive())
            .await?;
        let snapshot = Snapshot::new(groups).for_view(view);

        self.write_cache(view, &snapshot).await;
        self.request_export(view);

        info!(
            groups = snapshot.group_count(),
            items = snapshot.item_count(),
            "Snapshot loaded from repository and cached"
        );
        Ok(Arc::new(snapshot))
    }

    fn request_export(&self, view: SnapshotView) {
        match &self.exports {
            Some(queue) => {
                queue.enqueue(view);
            }
            None => debug!(%view, "No export queue attached, skipping export"),
        }
    }

    async fn read_cache(&self, view: SnapshotView) -> Option<Snapshot> {
        let key = self.keys.snapshot(view);
        let bytes = match self.cache.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, key = %key, "Cache read failed, treating as miss");
                return None;
            }
        };

        match deserialize_snapshot(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, key = %key, "Discarding undecodable cache entry");
                None
            }
        }
    }

    async fn write_cache(&self, view: SnapshotView, snapshot: &Snapshot) {
        let key = self.keys.snapshot(view);
        let bytes = match serialize_snapshot(snapshot) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, key = %key, "Failed to encode snapshot for cache");
                return;
            }
        };

        if let Err(e) = self.cache.set(&key, &bytes, Some(self.ttl)).await {
            warn!(error = %e, key = %key, "Cache write failed");
        }
    }

    async fn cached_version(&self, view: SnapshotView) -> Option<Version> {
        let key = self.keys.version(view);
        let bytes = match self.cache.get(&key).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!(error = %e, key = %key, "Version cache read failed");
                return None;
            }
        };

        let raw = String::from_utf8_lossy(&bytes);
        match Version::parse(&raw) {
            Ok(version) => Some(version),
            Err(e) => {
                warn!(error = %e, key = %key, "Ignoring malformed cached version");
                None
            }
        }
    }

    async fn listed_version(&self, view: SnapshotView) -> Option<Version> {
        let prefix = self.layout.list_prefix(view);
        match self.objects.list(&self.layout.bucket, &prefix).await {
            Ok(names) => self.layout.latest_version(view, &names),
            Err(e) => {
                warn!(error = %e, prefix = %prefix, "Listing snapshot objects failed");
                None
            }
        }
    }

    async fn read_object_store(&self, view: SnapshotView) -> Option<Snapshot> {
        let version = match self.cached_version(view).await {
            Some(version) => version,
            None => self.listed_version(view).await?,
        };
        let name = self.layout.object_name(view, &version);

        let object = match self.objects.download(&self.layout.bucket, &name).await {
            Ok(object) => object,
            Err(e) => {
                warn!(error = %e, name = %name, "Snapshot object unavailable, falling back");
                return None;
            }
        };

        let snapshot = SnapshotFile::from_json(&object.data).and_then(SnapshotFile::into_snapshot);
        match snapshot {
            Ok(snapshot) => {
                debug!(%version, name = %name, "Loaded snapshot object");
                Some(snapshot.for_view(view))
            }
            Err(e) => {
                warn!(error = %e, name = %name, "Snapshot object unreadable, falling back");
                None
            }
        }
    }
}
