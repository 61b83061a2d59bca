//! Imperative shell of strata.
//!
//! Concrete adapters for the traits declared in `strata_core` plus the
//! orchestration built on them: the tiered snapshot read path, background
//! export, event dispatch and the external event consumer.

pub mod bus;
pub mod cache;
pub mod config;
pub mod consumer;
pub mod demo_data;
pub mod events;
pub mod object_store;
pub mod shutdown;
pub mod snapshot;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use consumer::{ExternalEventConsumer, Registration};
pub use shutdown::Shutdown;
