use std::sync::Arc;

use metrics::counter;
use tracing::{debug, error, instrument};

use strata_core::bus::EventBus;
use strata_core::events::{DispatchError, DomainEvent};

use super::HandlerRegistry;

pub(crate) const METRIC_BUS_PUBLISH_FAILURES: &str = "strata_bus_publish_failures_total";

/// Delivers domain events to local handlers and, optionally, the external bus.
///
/// Local handlers are authoritative: the first failure stops dispatch and is
/// returned. Publishing is best effort and never fails a dispatch.
pub struct EventDispatcher {
    registry: HandlerRegistry,
    bus: Option<Arc<dyn EventBus>>,
    enable_publishing: bool,
}

impl EventDispatcher {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            bus: None,
            enable_publishing: false,
        }
    }

    /// Attaches a bus. Events are only forwarded when `enable_publishing` is set.
    pub fn with_bus(mut self, bus: Arc<dyn EventBus>, enable_publishing: bool) -> Self {
        self.bus = Some(bus);
        self.enable_publishing = enable_publishing;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Dispatches `events` in order.
    #[instrument(skip_all, fields(events = events.len()))]
    pub async fn dispatch(&self, events: Vec<DomainEvent>) -> Result<(), DispatchError> {
        for event in &events {
            self.dispatch_one(event).await?;
        }
        Ok(())
    }

    async fn dispatch_one(&self, event: &DomainEvent) -> Result<(), DispatchError> {
        let event_type = event.type_name();

        for handler in self.registry.handlers_for(event.kind()) {
            if let Err(source) = handler.handle(event).await {
                error!(
                    event_type = %event_type,
                    handler = handler.name(),
                    error = %source,
                    "Local event handler failed"
                );
                return Err(DispatchError::Handler {
                    event_type,
                    handler: handler.name().to_string(),
                    source,
                });
            }
        }

        let Some(bus) = self.bus.as_ref().filter(|_| self.enable_publishing) else {
            return Ok(());
        };

        match bus.publish(event, None).await {
            Ok(message_id) => {
                debug!(event_type = %event_type, message_id = %message_id, "Published event to bus")
            }
            Err(e) => {
                counter!(METRIC_BUS_PUBLISH_FAILURES).increment(1);
                error!(event_type = %event_type, error = %e, "Failed to publish event to bus");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::testing::RecordingHandler;
    use strata_core::bus::BusError;
    use strata_core::events::{AggregateRef, EventHandler, EventKind, HandlerError};

    #[derive(Default)]
    struct StubBus {
        fail: bool,
        published: AtomicUsize,
    }

    #[async_trait]
    impl EventBus for StubBus {
        async fn publish(
            &self,
            event: &DomainEvent,
            _topic: Option<&str>,
        ) -> strata_core::bus::Result<String> {
            self.published.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BusError::PublishFailed {
                    topic: event.type_name(),
                    message: "broker unavailable".to_string(),
                });
            }
            Ok("msg-1".to_string())
        }

        async fn subscribe(
            &self,
            _subscription: &str,
            _event_type: &str,
            _handler: Arc<dyn EventHandler>,
        ) -> strata_core::bus::Result<()> {
            Ok(())
        }

        async fn start_consuming(&self) -> strata_core::bus::Result<()> {
            Ok(())
        }

        async fn stop_consuming(&self) -> strata_core::bus::Result<()> {
            Ok(())
        }
    }

    fn created(id: i64) -> DomainEvent {
        DomainEvent::created(AggregateRef::new("Observation", id))
    }

    #[tokio::test]
    async fn test_runs_handlers_for_matching_kind_only() {
        let on_created = Arc::new(RecordingHandler::new("on_created"));
        let on_deleted = Arc::new(RecordingHandler::new("on_deleted"));
        let dispatcher = EventDispatcher::new(
            HandlerRegistry::new()
                .with(EventKind::Created, on_created.clone())
                .with(EventKind::Deleted, on_deleted.clone()),
        );

        dispatcher.dispatch(vec![created(1), created(2)]).await.unwrap();

        assert_eq!(on_created.calls(), 2);
        assert_eq!(on_deleted.calls(), 0);
    }

    #[tokio::test]
    async fn test_handler_failure_stops_dispatch() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let failing = Arc::new(RecordingHandler::failing("validator").logging_to(log.clone()));
        let after = Arc::new(RecordingHandler::new("projector").logging_to(log.clone()));
        let bus = Arc::new(StubBus::default());
        let dispatcher = EventDispatcher::new(
            HandlerRegistry::new()
                .with(EventKind::Created, failing)
                .with(EventKind::Created, after.clone()),
        )
        .with_bus(bus.clone(), true);

        let result = dispatcher.dispatch(vec![created(1), created(2)]).await;

        assert_eq!(
            result,
            Err(DispatchError::Handler {
                event_type: "ObservationCreatedEvent".to_string(),
                handler: "validator".to_string(),
                source: HandlerError::new("validator refused"),
            })
        );
        assert_eq!(*log.lock().unwrap(), vec!["validator".to_string()]);
        assert_eq!(after.calls(), 0);
        assert_eq!(bus.published.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bus_failure_is_absorbed() {
        let handler = Arc::new(RecordingHandler::new("projector"));
        let bus = Arc::new(StubBus {
            fail: true,
            ..StubBus::default()
        });
        let dispatcher =
            EventDispatcher::new(HandlerRegistry::new().with(EventKind::Created, handler.clone()))
                .with_bus(bus.clone(), true);

        dispatcher.dispatch(vec![created(1), created(2)]).await.unwrap();

        assert_eq!(handler.calls(), 2);
        assert_eq!(bus.published.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_publishing_disabled_skips_bus() {
        let bus = Arc::new(StubBus::default());
        let dispatcher = EventDispatcher::new(HandlerRegistry::new()).with_bus(bus.clone(), false);

        dispatcher.dispatch(vec![created(1)]).await.unwrap();

        assert_eq!(bus.published.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_publishes_every_event_without_local_handlers() {
        let bus = Arc::new(StubBus::default());
        let dispatcher = EventDispatcher::new(HandlerRegistry::new()).with_bus(bus.clone(), true);

        dispatcher
            .dispatch(vec![
                created(1),
                DomainEvent::rejected(AggregateRef::new("Observation", 1), None),
            ])
            .await
            .unwrap();

        assert_eq!(bus.published.load(Ordering::SeqCst), 2);
    }
}
