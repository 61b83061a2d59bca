mod error;
mod message;
mod topic;
mod traits;

pub use error::{BusError, Result};
pub use message::{
    Acknowledgement, BusMessage, MessageAttributes, ATTR_EVENT_ID, ATTR_EVENT_TYPE, ATTR_SOURCE,
    ATTR_TIMESTAMP,
};
pub use topic::{derive_topic, resolve_topic, NameMapping};
pub use traits::{EventBus, MessageHandler, TopicPublisher, TopicSubscriber, Transport};
