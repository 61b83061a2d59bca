//! Long-running consumer for events published by other services.

use std::sync::Arc;

use tracing::{error, info};

use strata_core::bus::{EventBus, Result};
use strata_core::events::EventHandler;

use crate::shutdown::Shutdown;

/// One inbound binding: events of `event_type` pulled from `subscription`.
#[derive(Clone)]
pub struct Registration {
    pub subscription: String,
    pub event_type: String,
    pub handler: Arc<dyn EventHandler>,
}

impl Registration {
    pub fn new(
        subscription: impl Into<String>,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            subscription: subscription.into(),
            event_type: event_type.into(),
            handler,
        }
    }
}

pub struct ExternalEventConsumer {
    bus: Arc<dyn EventBus>,
    enable_consuming: bool,
    registrations: Vec<Registration>,
}

impl ExternalEventConsumer {
    pub fn new(bus: Arc<dyn EventBus>, enable_consuming: bool) -> Self {
        Self {
            bus,
            enable_consuming,
            registrations: Vec::new(),
        }
    }

    pub fn register(mut self, registration: Registration) -> Self {
        self.registrations.push(registration);
        self
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Subscribes every registration and consumes until `shutdown` fires.
    ///
    /// Returns immediately when consuming is disabled.
    pub async fn run(&self, shutdown: Shutdown) -> Result<()> {
        if !self.enable_consuming {
            info!("External event consumption is disabled");
            return Ok(());
        }

        for registration in &self.registrations {
            if let Err(e) = self
                .bus
                .subscribe(
                    &registration.subscription,
                    &registration.event_type,
                    registration.handler.clone(),
                )
                .await
            {
                error!(
                    error = %e,
                    subscription = %registration.subscription,
                    event_type = %registration.event_type,
                    "Failed to subscribe"
                );
                return Err(e);
            }
        }

        if let Err(e) = self.bus.start_consuming().await {
            error!(error = %e, "Failed to start consuming");
            return Err(e);
        }
        info!(
            subscriptions = self.registrations.len(),
            "Consuming external events"
        );

        shutdown.wait().await;

        info!("Stopping external event consumer");
        self.bus.stop_consuming().await.inspect_err(|e| {
            error!(error = %e, "Failed to stop consuming");
        })
    }
}
