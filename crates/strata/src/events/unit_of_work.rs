use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use strata_core::events::{DispatchError, HasDomainEvents};

use super::EventDispatcher;

/// Errors from [`UnitOfWork::save`].
#[derive(Debug, Error)]
pub enum UnitOfWorkError<E>
where
    E: std::error::Error + 'static,
{
    /// The commit failed; no event was dispatched.
    #[error("Commit failed: {0}")]
    Commit(#[source] E),
    /// The commit succeeded but a local handler failed.
    #[error(transparent)]
    Dispatch(DispatchError),
}

/// Commits aggregate changes and dispatches their events afterwards.
#[derive(Clone)]
pub struct UnitOfWork {
    dispatcher: Arc<EventDispatcher>,
}

impl UnitOfWork {
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Drains pending events from `aggregates` in order, awaits `commit`, and
    /// dispatches the drained events once the commit succeeded.
    ///
    /// Events are drained exactly once per call. On commit failure they are
    /// dropped with the failed change. Returns the number of dispatched events.
    pub async fn save<'a, I, A, F, E>(
        &self,
        aggregates: I,
        commit: F,
    ) -> Result<usize, UnitOfWorkError<E>>
    where
        I: IntoIterator<Item = &'a mut A>,
        A: HasDomainEvents + ?Sized + 'a,
        F: Future<Output = Result<(), E>>,
        E: std::error::Error + 'static,
    {
        let events: Vec<_> = aggregates
            .into_iter()
            .flat_map(|aggregate| aggregate.take_events())
            .collect();

        if let Err(e) = commit.await {
            warn!(error = %e, dropped = events.len(), "Commit failed, events not dispatched");
            return Err(UnitOfWorkError::Commit(e));
        }

        let count = events.len();
        self.dispatcher
            .dispatch(events)
            .await
            .map_err(UnitOfWorkError::Dispatch)?;

        debug!(count, "Dispatched committed events");
        Ok(count)
    }
}
