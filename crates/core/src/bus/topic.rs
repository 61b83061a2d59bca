//! Topic resolution for domain events.

use std::collections::HashMap;

use super::BusError;

/// Derives the default topic for an event type name.
///
/// Lower-cases the name and strips one trailing `event`.
///
/// ```
/// use strata_core::bus::derive_topic;
///
/// assert_eq!(derive_topic("ObservationCreatedEvent"), "observationcreated");
/// assert_eq!(derive_topic("Heartbeat"), "heartbeat");
/// ```
pub fn derive_topic(event_type: &str) -> String {
    let lower = event_type.to_lowercase();
    match lower.strip_suffix("event") {
        Some(stripped) => stripped.to_string(),
        None => lower,
    }
}

/// Explicit `name -> target` overrides, falling back to a default rule.
///
/// Used for both topic overrides (keyed by event type name) and subscription
/// overrides (keyed by logical subscription name).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMapping {
    overrides: HashMap<String, String>,
}

impl NameMapping {
    pub fn new(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    /// Parses `Name=target,Other=target2`. Whitespace around entries is ignored.
    ///
    /// ```
    /// use strata_core::bus::NameMapping;
    ///
    /// let mapping = NameMapping::parse("ObservationCreatedEvent=observations").unwrap();
    /// assert_eq!(mapping.get("ObservationCreatedEvent"), Some("observations"));
    /// ```
    pub fn parse(value: &str) -> Result<Self, BusError> {
        let mut overrides = HashMap::new();
        for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, target) = entry
                .split_once('=')
                .map(|(n, t)| (n.trim(), t.trim()))
                .filter(|(n, t)| !n.is_empty() && !t.is_empty())
                .ok_or_else(|| BusError::InvalidMapping(entry.to_string()))?;
            overrides.insert(name.to_string(), target.to_string());
        }
        Ok(Self { overrides })
    }

    pub fn insert(&mut self, name: impl Into<String>, target: impl Into<String>) {
        self.overrides.insert(name.into(), target.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.overrides.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Topic for an event type: explicit override, else [`derive_topic`].
    pub fn topic_for(&self, event_type: &str) -> String {
        self.get(event_type)
            .map(str::to_string)
            .unwrap_or_else(|| derive_topic(event_type))
    }

    /// Transport subscription for a logical name: override, else the name itself.
    pub fn subscription_for(&self, subscription: &str) -> String {
        self.get(subscription).unwrap_or(subscription).to_string()
    }
}

/// Resolves the topic for a publish: explicit argument, then mapping, then derivation.
pub fn resolve_topic(explicit: Option<&str>, mapping: &NameMapping, event_type: &str) -> String {
    match explicit {
        Some(topic) => topic.to_string(),
        None => mapping.topic_for(event_type),
    }
}
