use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use strata_core::events::{DomainEvent, EventHandler, HandlerError};

use super::SnapshotService;

/// Aggregate type whose events announce a change of the classification tree.
pub const CLASSIFICATION_AGGREGATE: &str = "Classification";

/// Rebuilds the cached snapshot from the repository whenever it handles an event.
pub struct SnapshotRefreshHandler {
    service: Arc<SnapshotService>,
}

impl SnapshotRefreshHandler {
    pub fn new(service: Arc<SnapshotService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for SnapshotRefreshHandler {
    fn name(&self) -> &str {
        "snapshot-refresh"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let snapshot = self
            .service
            .refresh_snapshot()
            .await
            .map_err(|e| HandlerError::new(e.to_string()))?;

        info!(
            event_type = %event.type_name(),
            aggregate_id = %event.aggregate.id,
            groups = snapshot.group_count(),
            "Snapshot refreshed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::object_store::MemoryObjectStore;
    use crate::testing::{sample_groups, CountingRepository, FailingRepository};
    use std::time::Duration;
    use strata_core::cache::CacheKeys;
    use strata_core::events::AggregateRef;
    use strata_core::object_store::ObjectLayout;
    use strata_core::snapshot::SnapshotView;
    use strata_core::storage::SnapshotRepository;

    fn service(repository: Arc<dyn SnapshotRepository>) -> Arc<SnapshotService> {
        Arc::new(SnapshotService::new(
            Arc::new(MemoryCache::new(8)),
            Arc::new(MemoryObjectStore::new()),
            repository,
            CacheKeys::default(),
            ObjectLayout::default(),
            Duration::from_secs(60),
        ))
    }

    fn updated() -> DomainEvent {
        DomainEvent::updated(AggregateRef::new(CLASSIFICATION_AGGREGATE, 1))
    }

    #[tokio::test]
    async fn test_handle_rereads_repository() {
        let repository = CountingRepository::new(sample_groups());
        let service = service(Arc::new(repository.clone()));
        service.get_snapshot(SnapshotView::ActiveOnly).await.unwrap();
        assert_eq!(repository.loads(), 1);

        SnapshotRefreshHandler::new(service.clone())
            .handle(&updated())
            .await
            .unwrap();

        // Both views are rebuilt.
        assert_eq!(repository.loads(), 3);
        service.get_snapshot(SnapshotView::ActiveOnly).await.unwrap();
        service.get_snapshot(SnapshotView::All).await.unwrap();
        assert_eq!(repository.loads(), 3);
    }

    #[tokio::test]
    async fn test_repository_failure_is_handler_error() {
        let handler = SnapshotRefreshHandler::new(service(Arc::new(FailingRepository)));

        let error = handler.handle(&updated()).await.unwrap_err();

        assert!(error.0.contains("Repository unavailable"));
    }
}
