//! Event envelope crossing the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event with the metadata the bus needs for routing.
///
/// The payload is JSON at this layer; subscribers decode it back into the
/// typed catalog at their boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The event type, used as the subscription topic.
    pub event_type: String,

    /// The aggregate this event is about.
    pub aggregate_id: String,

    /// When the event was published.
    pub occurred_on: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<String>,
    occurred_on: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID (defaults to a fresh random ID).
    pub fn event_id(mut self, event_id: EventId) -> Self {
        self.event_id = Some(event_id);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, aggregate_id: impl Into<String>) -> Self {
        self.aggregate_id = Some(aggregate_id.into());
        self
    }

    /// Sets the publication timestamp (defaults to now).
    pub fn occurred_on(mut self, occurred_on: DateTime<Utc>) -> Self {
        self.occurred_on = Some(occurred_on);
        self
    }

    /// Serializes the given value as the payload.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets a raw JSON payload.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the envelope.
    ///
    /// # Panics
    ///
    /// Panics if `event_type` or `aggregate_id` was not set. Both are
    /// programming errors at the call site, not runtime conditions.
    pub fn build(self) -> EventEnvelope {
        EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type.expect("event_type is required"),
            aggregate_id: self.aggregate_id.expect("aggregate_id is required"),
            occurred_on: self.occurred_on.unwrap_or_else(Utc::now),
            payload: self.payload.unwrap_or(serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_defaults() {
        let envelope = EventEnvelope::builder()
            .event_type("UserLoggedIn")
            .aggregate_id("account-1")
            .payload_raw(serde_json::json!({"session": "s-1"}))
            .build();

        assert_eq!(envelope.event_type, "UserLoggedIn");
        assert_eq!(envelope.aggregate_id, "account-1");
        assert_eq!(envelope.payload["session"], "s-1");
    }

    #[test]
    fn envelope_serialization_roundtrip() {
        let envelope = EventEnvelope::builder()
            .event_type("SessionTerminated")
            .aggregate_id("account-2")
            .payload_raw(serde_json::json!({"n": 3}))
            .build();

        let json = serde_json::to_string(&envelope).unwrap();
        let back: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_id, envelope.event_id);
        assert_eq!(back.event_type, "SessionTerminated");
    }

    #[test]
    #[should_panic(expected = "event_type is required")]
    fn builder_requires_event_type() {
        EventEnvelope::builder().aggregate_id("a").build();
    }
}
