use thiserror::Error;

/// Failure reported by an event handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors surfaced by event dispatch.
///
/// Only local handler failures reach the caller. Bus failures are absorbed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Handler {handler} failed for {event_type}: {source}")]
    Handler {
        event_type: String,
        handler: String,
        #[source]
        source: HandlerError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_display() {
        assert_eq!(HandlerError::new("disk full").to_string(), "disk full");
    }

    #[test]
    fn test_dispatch_error_display() {
        let error = DispatchError::Handler {
            event_type: "ObservationCreatedEvent".to_string(),
            handler: "snapshot-invalidator".to_string(),
            source: HandlerError::new("cache unavailable"),
        };
        assert_eq!(
            error.to_string(),
            "Handler snapshot-invalidator failed for ObservationCreatedEvent: cache unavailable"
        );
    }
}
