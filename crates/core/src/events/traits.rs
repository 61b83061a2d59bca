use async_trait::async_trait;

use super::{DomainEvent, HandlerError};

/// Reacts to a domain event, either in-process or from the external bus.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError>;
}
