//! Topic-based event bus over a pluggable transport.
//!
//! Publisher and subscriber handles are created lazily and cached:
//! one publisher per topic, one subscriber per subscription name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use strata_core::bus::{
    resolve_topic, Acknowledgement, BusError, BusMessage, EventBus, MessageHandler, NameMapping,
    Result, TopicPublisher, TopicSubscriber, Transport,
};
use strata_core::events::{DomainEvent, EventHandler};

/// Naming and lifecycle settings for [`PubSubBus`].
#[derive(Debug, Clone)]
pub struct PubSubSettings {
    /// Value of the `source` attribute on published messages.
    pub source: String,
    pub topic_mappings: NameMapping,
    pub subscription_mappings: NameMapping,
    /// Upper bound for stopping one handle.
    pub shutdown_timeout: Duration,
}

impl Default for PubSubSettings {
    fn default() -> Self {
        Self {
            source: "strata".to_string(),
            topic_mappings: NameMapping::default(),
            subscription_mappings: NameMapping::default(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

pub struct PubSubBus<T> {
    transport: T,
    settings: PubSubSettings,
    publishers: RwLock<HashMap<String, Arc<dyn TopicPublisher>>>,
    subscribers: RwLock<HashMap<String, Arc<dyn TopicSubscriber>>>,
    consuming: AtomicBool,
}

impl<T: Transport> PubSubBus<T> {
    pub fn new(transport: T, settings: PubSubSettings) -> Self {
        Self {
            transport,
            settings,
            publishers: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            consuming: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_consuming(&self) -> bool {
        self.consuming.load(Ordering::SeqCst)
    }

    /// Stops one subscriber, bounded by the shutdown timeout.
    async fn stop_subscriber(&self, name: &str, subscriber: &Arc<dyn TopicSubscriber>) {
        let timeout = self.settings.shutdown_timeout;
        match tokio::time::timeout(timeout, subscriber.stop()).await {
            Ok(Ok(())) => debug!(subscription = %name, "Stopped subscriber"),
            Ok(Err(e)) => warn!(subscription = %name, error = %e, "Subscriber stop failed"),
            Err(_) => warn!(subscription = %name, "Subscriber stop timed out"),
        }
    }

    /// Returns the cached publisher for `topic`, creating it on first use.
    async fn publisher_for(&self, topic: &str) -> Result<Arc<dyn TopicPublisher>> {
        if let Some(publisher) = self.publishers.read().await.get(topic) {
            return Ok(publisher.clone());
        }

        let mut publishers = self.publishers.write().await;
        // Re-check: another task may have created it between the locks.
        if let Some(publisher) = publishers.get(topic) {
            return Ok(publisher.clone());
        }

        let publisher = self.transport.publisher(topic).await?;
        publishers.insert(topic.to_string(), publisher.clone());
        debug!(topic, "Created publisher");
        Ok(publisher)
    }
}

#[async_trait]
impl<T: Transport> EventBus for PubSubBus<T> {
    #[instrument(skip(self, event), fields(event_type = %event.type_name()))]
    async fn publish(&self, event: &DomainEvent, topic: Option<&str>) -> Result<String> {
        let event_type = event.type_name();
        let topic = resolve_topic(topic, &self.settings.topic_mappings, &event_type);

        let message = BusMessage::from_event(event, &self.settings.source)?;
        let publisher = self.publisher_for(&topic).await?;
        let message_id = publisher.send(message).await?;

        info!(topic = %topic, message_id = %message_id, "Published event");
        Ok(message_id)
    }

    async fn subscribe(
        &self,
        subscription: &str,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()> {
        let name = self.settings.subscription_mappings.subscription_for(subscription);
        let topic = self.settings.topic_mappings.topic_for(event_type);

        let mut subscribers = self.subscribers.write().await;
        if subscribers.contains_key(&name) {
            return Err(BusError::AlreadySubscribed(name));
        }

        let adapter = Arc::new(HandlerAdapter {
            event_type: event_type.to_string(),
            handler,
        });
        let subscriber = self.transport.subscriber(&name, &topic, adapter).await?;

        if self.is_consuming() {
            subscriber.start().await?;
        }
        subscribers.insert(name.clone(), subscriber);

        info!(subscription = %name, topic = %topic, event_type, "Subscribed");
        Ok(())
    }

    async fn start_consuming(&self) -> Result<()> {
        if self.consuming.swap(true, Ordering::SeqCst) {
            debug!("Already consuming");
            return Ok(());
        }

        let subscribers = self.subscribers.read().await;
        let mut started = Vec::with_capacity(subscribers.len());
        for (name, subscriber) in subscribers.iter() {
            if let Err(e) = subscriber.start().await {
                error!(subscription = %name, error = %e, "Failed to start subscriber");
                // Leave nothing running so a later call starts from scratch.
                for (name, subscriber) in started {
                    self.stop_subscriber(name, subscriber).await;
                }
                self.consuming.store(false, Ordering::SeqCst);
                return Err(e);
            }
            started.push((name, subscriber));
        }

        info!(subscribers = subscribers.len(), "Started consuming");
        Ok(())
    }

    async fn stop_consuming(&self) -> Result<()> {
        self.consuming.store(false, Ordering::SeqCst);
        let timeout = self.settings.shutdown_timeout;

        let subscribers: Vec<_> = self.subscribers.write().await.drain().collect();
        for (name, subscriber) in &subscribers {
            self.stop_subscriber(name, subscriber).await;
        }

        let publishers: Vec<_> = self.publishers.write().await.drain().collect();
        for (topic, publisher) in publishers {
            match tokio::time::timeout(timeout, publisher.shutdown()).await {
                Ok(Ok(())) => debug!(topic = %topic, "Shut down publisher"),
                Ok(Err(e)) => warn!(topic = %topic, error = %e, "Publisher shutdown failed"),
                Err(_) => warn!(topic = %topic, "Publisher shutdown timed out"),
            }
        }

        info!("Stopped consuming");
        Ok(())
    }
}

/// Decodes inbound messages and routes them to a domain handler.
struct HandlerAdapter {
    event_type: String,
    handler: Arc<dyn EventHandler>,
}

#[async_trait]
impl MessageHandler for HandlerAdapter {
    async fn handle(&self, message: &BusMessage) -> Acknowledgement {
        let event = match message.decode_event() {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    expected = %self.event_type,
                    message_id = ?message.event_id(),
                    error = %e,
                    "Rejecting undecodable message"
                );
                return Acknowledgement::Nack;
            }
        };

        let event_type = event.type_name();
        if event_type != self.event_type {
            warn!(
                expected = %self.event_type,
                actual = %event_type,
                "Rejecting message of unexpected type"
            );
            return Acknowledgement::Nack;
        }

        match self.handler.handle(&event).await {
            Ok(()) => Acknowledgement::Ack,
            Err(e) => {
                error!(
                    handler = self.handler.name(),
                    event_type = %event_type,
                    error = %e,
                    "Inbound event handler failed"
                );
                Acknowledgement::Nack
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::bus::MemoryTransport;
    use crate::testing::RecordingHandler;
    use strata_core::bus::{ATTR_EVENT_TYPE, ATTR_SOURCE};
    use strata_core::events::AggregateRef;

    fn bus(settings: PubSubSettings) -> PubSubBus<MemoryTransport> {
        PubSubBus::new(MemoryTransport::new(3), settings)
    }

    fn created(id: i64) -> DomainEvent {
        DomainEvent::created(AggregateRef::new("Observation", id))
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    #[tokio::test]
    async fn test_publish_uses_derived_topic_and_attributes() {
        let bus = bus(PubSubSettings {
            source: "observations-api".to_string(),
            ..PubSubSettings::default()
        });

        let id = bus.publish(&created(1), None).await.unwrap();

        let published = bus.transport().published("observationcreated");
        assert_eq!(published.len(), 1);
        assert!(!id.is_empty());
        assert_eq!(
            published[0].attributes[ATTR_EVENT_TYPE],
            "ObservationCreatedEvent"
        );
        assert_eq!(published[0].attributes[ATTR_SOURCE], "observations-api");
    }

    #[tokio::test]
    async fn test_publish_topic_precedence() {
        let mut mappings = NameMapping::default();
        mappings.insert("ObservationCreatedEvent", "observations");
        let bus = bus(PubSubSettings {
            topic_mappings: mappings,
            ..PubSubSettings::default()
        });

        bus.publish(&created(1), None).await.unwrap();
        bus.publish(&created(2), Some("audit")).await.unwrap();

        assert_eq!(bus.transport().published("observations").len(), 1);
        assert_eq!(bus.transport().published("audit").len(), 1);
        assert!(bus.transport().published("observationcreated").is_empty());
    }

    #[tokio::test]
    async fn test_publisher_is_created_once_per_topic() {
        let bus = Arc::new(bus(PubSubSettings::default()));

        let tasks: Vec<_> = (0..5)
            .map(|i| {
                let bus = bus.clone();
                tokio::spawn(async move { bus.publish(&created(i), None).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(bus.transport().publishers_created(), 1);
        assert_eq!(bus.publishers.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_rejects_duplicate_name() {
        let bus = bus(PubSubSettings::default());
        let handler = Arc::new(RecordingHandler::new("h"));

        bus.subscribe("sync", "ObservationCreatedEvent", handler.clone())
            .await
            .unwrap();
        let result = bus
            .subscribe("sync", "ObservationUpdatedEvent", handler)
            .await;

        assert_eq!(result, Err(BusError::AlreadySubscribed("sync".to_string())));
    }

    #[tokio::test]
    async fn test_roundtrip_delivers_to_handler() {
        let bus = bus(PubSubSettings::default());
        let handler = Arc::new(RecordingHandler::new("h"));
        bus.subscribe("sync", "ObservationCreatedEvent", handler.clone())
            .await
            .unwrap();
        bus.start_consuming().await.unwrap();

        bus.publish(&created(7), None).await.unwrap();

        wait_for(|| handler.calls() == 1).await;
        let seen = handler.seen.lock().await;
        assert_eq!(seen[0].aggregate, AggregateRef::new("Observation", 7));
        assert_eq!(seen[0].type_name(), "ObservationCreatedEvent");
        drop(seen);
        bus.stop_consuming().await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_after_start_starts_immediately() {
        let bus = bus(PubSubSettings::default());
        bus.start_consuming().await.unwrap();
        bus.start_consuming().await.unwrap();

        let handler = Arc::new(RecordingHandler::new("late"));
        bus.subscribe("late", "ObservationCreatedEvent", handler.clone())
            .await
            .unwrap();
        bus.publish(&created(1), None).await.unwrap();

        wait_for(|| handler.calls() == 1).await;
        bus.stop_consuming().await.unwrap();
    }

    #[tokio::test]
    async fn test_mismatched_type_is_nacked_and_dead_lettered() {
        let bus = bus(PubSubSettings::default());
        let handler = Arc::new(RecordingHandler::new("h"));
        bus.subscribe("sync", "ObservationCreatedEvent", handler.clone())
            .await
            .unwrap();
        bus.start_consuming().await.unwrap();

        let deleted = DomainEvent::deleted(AggregateRef::new("Observation", 1));
        bus.publish(&deleted, Some("observationcreated")).await.unwrap();

        let transport = bus.transport().clone();
        wait_for(|| transport.dead_letter_count("sync") == 1).await;
        assert_eq!(handler.calls(), 0);
        bus.stop_consuming().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_consuming_clears_handles() {
        let bus = bus(PubSubSettings::default());
        bus.subscribe("sync", "ObservationCreatedEvent", Arc::new(RecordingHandler::new("h")))
            .await
            .unwrap();
        bus.publish(&created(1), None).await.unwrap();
        bus.start_consuming().await.unwrap();

        bus.stop_consuming().await.unwrap();
        bus.stop_consuming().await.unwrap();

        assert!(!bus.is_consuming());
        assert!(bus.publishers.read().await.is_empty());
        assert!(bus.subscribers.read().await.is_empty());

        // The name is free again once the old handle is gone.
        bus.subscribe("sync", "ObservationCreatedEvent", Arc::new(RecordingHandler::new("h")))
            .await
            .unwrap();
    }

    /// Transport whose subscribers fail the `fail_at`-th start call overall.
    struct FlakyTransport {
        fail_at: usize,
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    struct FlakySubscriber {
        fail_at: usize,
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn publisher(&self, _topic: &str) -> Result<Arc<dyn TopicPublisher>> {
            Err(BusError::Closed)
        }

        async fn subscriber(
            &self,
            _subscription: &str,
            _topic: &str,
            _handler: Arc<dyn MessageHandler>,
        ) -> Result<Arc<dyn TopicSubscriber>> {
            Ok(Arc::new(FlakySubscriber {
                fail_at: self.fail_at,
                starts: self.starts.clone(),
                stops: self.stops.clone(),
            }))
        }
    }

    #[async_trait]
    impl TopicSubscriber for FlakySubscriber {
        async fn start(&self) -> Result<()> {
            let call = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_at {
                return Err(BusError::ConnectionFailed("transient".to_string()));
            }
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_start_rolls_back_and_can_be_retried() {
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let bus = PubSubBus::new(
            FlakyTransport {
                fail_at: 2,
                starts: starts.clone(),
                stops: stops.clone(),
            },
            PubSubSettings::default(),
        );
        let handler = Arc::new(RecordingHandler::new("h"));
        bus.subscribe("sync", "ObservationCreatedEvent", handler.clone())
            .await
            .unwrap();
        bus.subscribe("audit", "ObservationDeletedEvent", handler)
            .await
            .unwrap();

        let first = bus.start_consuming().await;

        assert_eq!(
            first,
            Err(BusError::ConnectionFailed("transient".to_string()))
        );
        assert!(!bus.is_consuming());
        // The subscriber that did start was stopped again.
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        bus.start_consuming().await.unwrap();

        assert!(bus.is_consuming());
        assert_eq!(starts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_subscription_mapping_renames_transport_subscription() {
        let mut subscriptions = NameMapping::default();
        subscriptions.insert("sync", "observations-sync-v2");
        let bus = bus(PubSubSettings {
            subscription_mappings: subscriptions,
            ..PubSubSettings::default()
        });

        bus.subscribe("sync", "ObservationCreatedEvent", Arc::new(RecordingHandler::new("h")))
            .await
            .unwrap();

        assert!(bus
            .subscribers
            .read()
            .await
            .contains_key("observations-sync-v2"));
    }
}
