use thiserror::Error;

/// Errors that can occur on the external message bus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Bus connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Publish to {topic} failed: {message}")]
    PublishFailed { topic: String, message: String },
    #[error("Subscription {0} is already registered")]
    AlreadySubscribed(String),
    #[error("Subscription {subscription} failed: {message}")]
    SubscribeFailed {
        subscription: String,
        message: String,
    },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Invalid name mapping entry: {0}")]
    InvalidMapping(String),
    #[error("Bus handle is closed")]
    Closed,
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_failed_display() {
        let error = BusError::PublishFailed {
            topic: "observationcreated".to_string(),
            message: "deadline exceeded".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Publish to observationcreated failed: deadline exceeded"
        );
    }

    #[test]
    fn test_already_subscribed_display() {
        let error = BusError::AlreadySubscribed("reports".to_string());
        assert_eq!(error.to_string(), "Subscription reports is already registered");
    }

    #[test]
    fn test_closed_display() {
        assert_eq!(BusError::Closed.to_string(), "Bus handle is closed");
    }
}
