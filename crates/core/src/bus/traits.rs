use std::sync::Arc;

use async_trait::async_trait;

use crate::events::{DomainEvent, EventHandler};

use super::{Acknowledgement, BusMessage, Result};

/// Publish/subscribe surface used by the dispatcher and the consumer.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes an event and returns the transport's message id.
    ///
    /// `topic` overrides mapping and derivation when given.
    async fn publish(&self, event: &DomainEvent, topic: Option<&str>) -> Result<String>;

    /// Registers `handler` for inbound events of type `event_type`.
    async fn subscribe(
        &self,
        subscription: &str,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()>;

    /// Starts every registered subscriber. Calling it twice is a no-op.
    async fn start_consuming(&self) -> Result<()>;

    /// Stops subscribers and shuts down publishers. Calling it twice is a no-op.
    async fn stop_consuming(&self) -> Result<()>;
}

/// Invoked once per inbound transport message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &BusMessage) -> Acknowledgement;
}

/// Sends messages to one topic.
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    /// Sends a message, returning once the transport accepted it.
    async fn send(&self, message: BusMessage) -> Result<String>;

    /// Flushes and releases the handle.
    async fn shutdown(&self) -> Result<()>;
}

/// Pulls messages from one subscription and feeds its handler.
#[async_trait]
pub trait TopicSubscriber: Send + Sync {
    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}

/// Creates publisher and subscriber handles for a concrete broker.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publisher(&self, topic: &str) -> Result<Arc<dyn TopicPublisher>>;

    async fn subscriber(
        &self,
        subscription: &str,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Arc<dyn TopicSubscriber>>;
}
