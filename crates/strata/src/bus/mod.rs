//! External event bus adapters.
//!
//! [`PubSubBus`] implements `strata_core::bus::EventBus` over any
//! `Transport`. Transports:
//!
//! - [`MemoryTransport`]: in-process broker with bounded redelivery, for
//!   tests and single-process runs
//! - `RedisStreamTransport` (feature `redis`): Redis Streams consumer groups
//!
//! [`LoggingBus`] only logs what it would publish.

mod logging;
mod memory_transport;
mod pubsub;

#[cfg(feature = "redis")]
mod redis_streams;

pub use logging::LoggingBus;
pub use memory_transport::MemoryTransport;
pub use pubsub::{PubSubBus, PubSubSettings};

#[cfg(feature = "redis")]
pub use redis_streams::RedisStreamTransport;
