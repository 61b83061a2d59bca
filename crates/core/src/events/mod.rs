mod error;
mod recorder;
mod traits;
mod types;

pub use error::{DispatchError, HandlerError};
pub use recorder::{EventRecorder, HasDomainEvents};
pub use traits::EventHandler;
pub use types::{AggregateRef, DomainEvent, EventKind, EventPayload};
