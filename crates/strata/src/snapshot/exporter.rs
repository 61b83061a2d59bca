use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tracing::{error, info, instrument, warn};

use strata_core::cache::{Cache, CacheKeys};
use strata_core::object_store::{ObjectLayout, ObjectStore, Version, JSON_CONTENT_TYPE};
use strata_core::snapshot::{Snapshot, SnapshotFile, SnapshotView, SCHEMA_VERSION};
use strata_core::storage::SnapshotRepository;

/// Writes a repository snapshot to the object store as a new version.
pub struct SnapshotExporter {
    repository: Arc<dyn SnapshotRepository>,
    objects: Arc<dyn ObjectStore>,
    cache: Arc<dyn Cache>,
    layout: ObjectLayout,
    keys: CacheKeys,
    ttl: Duration,
    source: String,
}

impl SnapshotExporter {
    pub fn new(
        repository: Arc<dyn SnapshotRepository>,
        objects: Arc<dyn ObjectStore>,
        cache: Arc<dyn Cache>,
        layout: ObjectLayout,
        keys: CacheKeys,
        ttl: Duration,
    ) -> Self {
        Self {
            repository,
            objects,
            cache,
            layout,
            keys,
            ttl,
            source: strata_core::snapshot::DEFAULT_SOURCE.to_string(),
        }
    }

    /// Overrides the `source` field written into exported files.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Exports the current repository state for `view`.
    ///
    /// Returns `false` on any failure. A failed export leaves the previous
    /// version key and cached snapshot untouched.
    #[instrument(skip(self), fields(view = %view))]
    pub async fn export(&self, view: SnapshotView) -> bool {
        let groups = match self.repository.load_groups(view.includes_inactive()).await {
            Ok(groups) => groups,
            Err(e) => {
                error!(error = %e, "Snapshot export failed: repository read");
                return false;
            }
        };
        let snapshot = Snapshot::new(groups).for_view(view);

        let now = Utc::now();
        let version = Version::from_datetime(now);
        let file = SnapshotFile::from_snapshot(&snapshot, self.source.clone(), now);
        let body = match file.to_json_pretty() {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Snapshot export failed: encode");
                return false;
            }
        };

        let name = self.layout.object_name(view, &version);
        let metadata = HashMap::from([
            ("version".to_string(), version.to_string()),
            ("schemaVersion".to_string(), SCHEMA_VERSION.to_string()),
            (
                "exportedAt".to_string(),
                now.to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            ("groupsCount".to_string(), snapshot.group_count().to_string()),
            (
                "categoriesCount".to_string(),
                snapshot.category_count().to_string(),
            ),
            ("itemsCount".to_string(), snapshot.item_count().to_string()),
            ("view".to_string(), view.as_str().to_string()),
        ]);

        if let Err(e) = self
            .objects
            .upload(&self.layout.bucket, &name, body, JSON_CONTENT_TYPE, metadata)
            .await
        {
            error!(error = %e, bucket = %self.layout.bucket, name = %name, "Snapshot export failed: upload");
            return false;
        }

        // The object is already durable; a stale version key only costs a listing.
        if let Err(e) = self
            .cache
            .set(
                &self.keys.version(view),
                version.as_str().as_bytes(),
                Some(self.ttl),
            )
            .await
        {
            warn!(error = %e, %version, "Failed to cache exported version");
        }

        info!(
            %version,
            name = %name,
            groups = snapshot.group_count(),
            items = snapshot.item_count(),
            "Exported snapshot"
        );
        true
    }
}
