use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use strata_core::bus::{resolve_topic, BusError, EventBus, NameMapping, Result};
use strata_core::events::{DomainEvent, EventHandler};

/// Bus that logs instead of publishing. Used when no broker is configured.
#[derive(Debug, Clone, Default)]
pub struct LoggingBus {
    topic_mappings: NameMapping,
}

impl LoggingBus {
    pub fn new(topic_mappings: NameMapping) -> Self {
        Self { topic_mappings }
    }
}

#[async_trait]
impl EventBus for LoggingBus {
    async fn publish(&self, event: &DomainEvent, topic: Option<&str>) -> Result<String> {
        let event_type = event.type_name();
        let topic = resolve_topic(topic, &self.topic_mappings, &event_type);
        let payload =
            serde_json::to_string(event).map_err(|e| BusError::Serialization(e.to_string()))?;

        info!(topic = %topic, event_type = %event_type, payload = %payload, "Would publish");
        Ok(Uuid::new_v4().to_string())
    }

    async fn subscribe(
        &self,
        subscription: &str,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()> {
        info!(
            subscription,
            event_type,
            handler = handler.name(),
            "Would subscribe"
        );
        Ok(())
    }

    async fn start_consuming(&self) -> Result<()> {
        info!("Would start consuming");
        Ok(())
    }

    async fn stop_consuming(&self) -> Result<()> {
        info!("Would stop consuming");
        Ok(())
    }
}
