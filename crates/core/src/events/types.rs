use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies the aggregate an event concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRef {
    /// Aggregate type name in PascalCase, e.g. `Observation`.
    pub aggregate_type: String,
    pub id: String,
}

impl AggregateRef {
    pub fn new(aggregate_type: impl Into<String>, id: impl fmt::Display) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            id: id.to_string(),
        }
    }
}

/// Fieldless discriminant of [`EventPayload`], used to key handler registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    Updated,
    StatusChanged,
    Published,
    Rejected,
    UploadFailed,
    Deleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::StatusChanged => "StatusChanged",
            Self::Published => "Published",
            Self::Rejected => "Rejected",
            Self::UploadFailed => "UploadFailed",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventPayload {
    Created,
    Updated,
    StatusChanged { from: String, to: String },
    Published,
    Rejected { reason: Option<String> },
    UploadFailed { error: String },
    Deleted,
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Created => EventKind::Created,
            Self::Updated => EventKind::Updated,
            Self::StatusChanged { .. } => EventKind::StatusChanged,
            Self::Published => EventKind::Published,
            Self::Rejected { .. } => EventKind::Rejected,
            Self::UploadFailed { .. } => EventKind::UploadFailed,
            Self::Deleted => EventKind::Deleted,
        }
    }
}

/// A fact produced by a successful business operation.
///
/// Serialized on the bus as a flat JSON object:
///
/// ```json
/// {
///   "aggregate": { "aggregateType": "Observation", "id": "42" },
///   "occurredAt": "2025-01-14T10:30:00Z",
///   "kind": "StatusChanged",
///   "from": "Draft",
///   "to": "Submitted"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub aggregate: AggregateRef,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl DomainEvent {
    /// Builds an event that occurred now.
    pub fn new(aggregate: AggregateRef, payload: EventPayload) -> Self {
        Self {
            aggregate,
            occurred_at: Utc::now(),
            payload,
        }
    }

    pub fn created(aggregate: AggregateRef) -> Self {
        Self::new(aggregate, EventPayload::Created)
    }

    pub fn updated(aggregate: AggregateRef) -> Self {
        Self::new(aggregate, EventPayload::Updated)
    }

    pub fn status_changed(
        aggregate: AggregateRef,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::new(
            aggregate,
            EventPayload::StatusChanged {
                from: from.into(),
                to: to.into(),
            },
        )
    }

    pub fn published(aggregate: AggregateRef) -> Self {
        Self::new(aggregate, EventPayload::Published)
    }

    pub fn rejected(aggregate: AggregateRef, reason: Option<String>) -> Self {
        Self::new(aggregate, EventPayload::Rejected { reason })
    }

    pub fn upload_failed(aggregate: AggregateRef, error: impl Into<String>) -> Self {
        Self::new(
            aggregate,
            EventPayload::UploadFailed {
                error: error.into(),
            },
        )
    }

    pub fn deleted(aggregate: AggregateRef) -> Self {
        Self::new(aggregate, EventPayload::Deleted)
    }

    /// Overrides the occurrence timestamp.
    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Concrete type name, `<AggregateType><Kind>Event`.
    ///
    /// ```
    /// use strata_core::events::{AggregateRef, DomainEvent};
    ///
    /// let event = DomainEvent::created(AggregateRef::new("Observation", 7));
    /// assert_eq!(event.type_name(), "ObservationCreatedEvent");
    /// ```
    pub fn type_name(&self) -> String {
        format!("{}{}Event", self.aggregate.aggregate_type, self.kind())
    }
}
