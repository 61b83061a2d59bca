use super::DomainEvent;

/// Pending events raised by one aggregate during a command.
///
/// Events stay here until a unit of work takes them. Taking empties the
/// buffer, so each event is handed out once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecorder {
    pending: Vec<DomainEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: DomainEvent) {
        self.pending.push(event);
    }

    /// Removes and returns every pending event in the order recorded.
    pub fn take(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[DomainEvent] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Implemented by aggregates that raise domain events.
pub trait HasDomainEvents {
    fn recorder(&mut self) -> &mut EventRecorder;

    fn record_event(&mut self, event: DomainEvent) {
        self.recorder().record(event);
    }

    fn take_events(&mut self) -> Vec<DomainEvent> {
        self.recorder().take()
    }
}
