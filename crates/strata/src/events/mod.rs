//! In-process domain event delivery.
//!
//! Commands record events on their aggregates. [`UnitOfWork::save`] drains
//! them, commits, and hands them to the [`EventDispatcher`], which runs local
//! handlers first and forwards to the external bus second.

mod dispatcher;
mod registry;
mod unit_of_work;

pub use dispatcher::EventDispatcher;
pub use registry::HandlerRegistry;
pub use unit_of_work::{UnitOfWork, UnitOfWorkError};
