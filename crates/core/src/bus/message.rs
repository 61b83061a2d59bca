use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::events::DomainEvent;

use super::{BusError, Result};

pub const ATTR_EVENT_TYPE: &str = "eventType";
pub const ATTR_EVENT_ID: &str = "eventId";
pub const ATTR_TIMESTAMP: &str = "timestamp";
pub const ATTR_SOURCE: &str = "source";

/// Fixed attribute set sent alongside every event body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttributes {
    pub event_type: String,
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl MessageAttributes {
    /// Attributes for an outgoing event, with a fresh event id.
    pub fn for_event(event: &DomainEvent, source: &str) -> Self {
        Self {
            event_type: event.type_name(),
            event_id: Uuid::new_v4(),
            timestamp: event.occurred_at,
            source: source.to_string(),
        }
    }

    /// Flattens into the string map carried by transports.
    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            (ATTR_EVENT_TYPE.to_string(), self.event_type.clone()),
            (ATTR_EVENT_ID.to_string(), self.event_id.to_string()),
            (
                ATTR_TIMESTAMP.to_string(),
                self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
            (ATTR_SOURCE.to_string(), self.source.clone()),
        ])
    }

    /// Reads attributes back from a transport map.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let field = |name: &str| {
            map.get(name)
                .cloned()
                .ok_or_else(|| BusError::InvalidMessage(format!("missing attribute {name}")))
        };

        let event_id = field(ATTR_EVENT_ID)?;
        let event_id = Uuid::parse_str(&event_id)
            .map_err(|e| BusError::InvalidMessage(format!("invalid eventId: {e}")))?;

        let timestamp = field(ATTR_TIMESTAMP)?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| BusError::InvalidMessage(format!("invalid timestamp: {e}")))?
            .with_timezone(&Utc);

        Ok(Self {
            event_type: field(ATTR_EVENT_TYPE)?,
            event_id,
            timestamp,
            source: field(ATTR_SOURCE)?,
        })
    }
}

/// One message as carried by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// UTF-8 JSON body.
    pub data: Vec<u8>,
    pub attributes: HashMap<String, String>,
}

impl BusMessage {
    /// Encodes an event with its attribute set.
    pub fn from_event(event: &DomainEvent, source: &str) -> Result<Self> {
        let data =
            serde_json::to_vec(event).map_err(|e| BusError::Serialization(e.to_string()))?;
        Ok(Self {
            data,
            attributes: MessageAttributes::for_event(event, source).to_map(),
        })
    }

    pub fn event_type(&self) -> Option<&str> {
        self.attributes.get(ATTR_EVENT_TYPE).map(String::as_str)
    }

    pub fn event_id(&self) -> Option<&str> {
        self.attributes.get(ATTR_EVENT_ID).map(String::as_str)
    }

    pub fn decode_event(&self) -> Result<DomainEvent> {
        serde_json::from_slice(&self.data).map_err(|e| BusError::Serialization(e.to_string()))
    }
}

/// Outcome a subscriber reports back to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Processed; the transport may drop the message.
    Ack,
    /// Rejected; the transport applies its own redelivery policy.
    Nack,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AggregateRef;
    use chrono::TimeZone;

    fn event() -> DomainEvent {
        DomainEvent::created(AggregateRef::new("Observation", 9))
            .at(Utc.with_ymd_and_hms(2025, 1, 14, 10, 30, 0).unwrap())
    }

    #[test]
    fn test_from_event_sets_attributes() {
        let message = BusMessage::from_event(&event(), "strata").unwrap();

        assert_eq!(message.event_type(), Some("ObservationCreatedEvent"));
        assert_eq!(message.attributes[ATTR_SOURCE], "strata");
        assert_eq!(message.attributes[ATTR_TIMESTAMP], "2025-01-14T10:30:00Z");
        assert!(Uuid::parse_str(message.event_id().unwrap()).is_ok());
        assert_eq!(message.decode_event().unwrap(), event());
    }

    #[test]
    fn test_event_ids_are_unique_per_message() {
        let a = BusMessage::from_event(&event(), "strata").unwrap();
        let b = BusMessage::from_event(&event(), "strata").unwrap();
        assert_ne!(a.event_id(), b.event_id());
    }

    #[test]
    fn test_attributes_map_roundtrip() {
        let attributes = MessageAttributes::for_event(&event(), "svc");
        let parsed = MessageAttributes::from_map(&attributes.to_map()).unwrap();
        assert_eq!(parsed, attributes);
    }

    #[test]
    fn test_from_map_reports_missing_attribute() {
        let mut map = MessageAttributes::for_event(&event(), "svc").to_map();
        map.remove(ATTR_SOURCE);

        assert_eq!(
            MessageAttributes::from_map(&map),
            Err(BusError::InvalidMessage("missing attribute source".to_string()))
        );
    }

    #[test]
    fn test_decode_garbage_body() {
        let message = BusMessage {
            data: b"<xml/>".to_vec(),
            attributes: HashMap::new(),
        };
        assert!(matches!(
            message.decode_event(),
            Err(BusError::Serialization(_))
        ));
    }
}
