use crate::snapshot::SnapshotView;

/// Default namespace prepended to every cache key.
pub const DEFAULT_NAMESPACE: &str = "strata";

/// Builds the cache keys used by the snapshot read path.
///
/// ```
/// use strata_core::cache::CacheKeys;
/// use strata_core::snapshot::SnapshotView;
///
/// let keys = CacheKeys::default();
/// assert_eq!(keys.snapshot(SnapshotView::ActiveOnly), "strata:snapshot:active");
/// assert_eq!(keys.version(SnapshotView::All), "strata:snapshot:version:all");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    namespace: String,
}

impl CacheKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key holding the serialized snapshot for a view.
    pub fn snapshot(&self, view: SnapshotView) -> String {
        format!("{}:snapshot:{}", self.namespace, view.as_str())
    }

    /// Key holding the latest exported version for a view.
    pub fn version(&self, view: SnapshotView) -> String {
        format!("{}:snapshot:version:{}", self.namespace, view.as_str())
    }

    /// Pattern matching every snapshot and version key of this namespace.
    pub fn snapshot_pattern(&self) -> String {
        format!("{}:snapshot:*", self.namespace)
    }
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::pattern_matches;

    #[test]
    fn test_views_use_distinct_keys() {
        let keys = CacheKeys::default();
        assert_ne!(
            keys.snapshot(SnapshotView::ActiveOnly),
            keys.snapshot(SnapshotView::All)
        );
        assert_ne!(
            keys.version(SnapshotView::ActiveOnly),
            keys.version(SnapshotView::All)
        );
    }

    #[test]
    fn test_custom_namespace() {
        let keys = CacheKeys::new("tenant-a");
        assert_eq!(keys.snapshot(SnapshotView::All), "tenant-a:snapshot:all");
        assert_eq!(
            keys.version(SnapshotView::ActiveOnly),
            "tenant-a:snapshot:version:active"
        );
    }

    #[test]
    fn test_pattern_covers_all_snapshot_keys() {
        let keys = CacheKeys::default();
        let pattern = keys.snapshot_pattern();

        for view in SnapshotView::all() {
            assert!(pattern_matches(&pattern, &keys.snapshot(view)));
            assert!(pattern_matches(&pattern, &keys.version(view)));
        }
        assert!(!pattern_matches(&pattern, "other:snapshot:active"));
    }
}
