//! Event types for Event Sourcing
//!
//! Events are immutable records of state changes. They are created by the
//! write path, owned by the stream adapter once stored, and replayed to
//! rebuild view state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cursor::StreamCursor;

/// A domain event payload
///
/// Payloads are usually enums with one variant per event type. The tag
/// returned here is persisted next to the payload and is what outbox
/// producers and adapters see.
pub trait EventPayload: Clone + Send + Sync + 'static {
    /// Stable type tag of this payload (e.g. `"PointsAdded"`)
    fn event_type(&self) -> &str;
}

/// An immutable event in a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<E> {
    /// Type tag of the payload
    #[serde(rename = "eventType")]
    pub event_type: String,

    /// Stream and offset of this event
    pub cursor: StreamCursor,

    /// Event-specific payload
    pub payload: E,

    /// When the event was captured by the writer
    #[serde(rename = "capturedAt")]
    pub captured_at: DateTime<Utc>,

    /// Who captured the event (user, service, agent)
    #[serde(rename = "capturedBy", default, skip_serializing_if = "Option::is_none")]
    pub captured_by: Option<String>,

    /// When the adapter persisted the event, if known
    #[serde(rename = "storedAt", default, skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<DateTime<Utc>>,
}

impl<E: EventPayload> Event<E> {
    /// Create a new event captured now
    pub fn new(cursor: StreamCursor, payload: E) -> Self {
        Self::with_timestamp(cursor, payload, Utc::now())
    }

    /// Create a new event with a specific capture time
    pub fn with_timestamp(cursor: StreamCursor, payload: E, captured_at: DateTime<Utc>) -> Self {
        Self {
            event_type: payload.event_type().to_string(),
            cursor,
            payload,
            captured_at,
            captured_by: None,
            stored_at: None,
        }
    }
}

impl<E> Event<E> {
    /// Set the author of this event
    pub fn with_author(mut self, captured_by: impl Into<String>) -> Self {
        self.captured_by = Some(captured_by.into());
        self
    }

    /// Offset of this event within its stream
    pub fn offset(&self) -> i64 {
        self.cursor.offset
    }

    /// Everything about the event except its payload
    pub fn meta(&self) -> EventMeta {
        EventMeta {
            event_type: self.event_type.clone(),
            cursor: self.cursor.clone(),
            captured_at: self.captured_at,
            captured_by: self.captured_by.clone(),
            stored_at: self.stored_at,
        }
    }
}

impl<E: Serialize> Event<E> {
    /// Serialize event to JSON string (for JSONL)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl<E: serde::de::DeserializeOwned> Event<E> {
    /// Deserialize event from JSON string
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Event metadata returned to writers after `append_event`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub cursor: StreamCursor,
    #[serde(rename = "capturedAt")]
    pub captured_at: DateTime<Utc>,
    #[serde(rename = "capturedBy", default, skip_serializing_if = "Option::is_none")]
    pub captured_by: Option<String>,
    #[serde(rename = "storedAt", default, skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Points;

    #[test]
    fn test_event_takes_type_tag_from_payload() {
        let event = Event::new(StreamCursor::new("ledger", "1", 1), Points::Added { amount: 5 });
        assert_eq!(event.event_type, "PointsAdded");
        assert_eq!(event.offset(), 1);
        assert!(event.captured_by.is_none());
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::new(StreamCursor::new("ledger", "1", 2), Points::Added { amount: 5 })
            .with_author("alice");

        let json = event.to_json_line().unwrap();
        assert!(json.contains("\"eventType\":\"PointsAdded\""));
        assert!(json.contains("\"capturedBy\":\"alice\""));
        assert!(!json.contains("storedAt"));

        let parsed: Event<Points> = Event::from_json_line(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_unknown_payload_decodes_to_catch_all() {
        let json = r#"{"eventType":"PointsSquared","cursor":{"streamType":"ledger","streamId":"1","offset":1},
            "payload":{"type":"PointsSquared"},"capturedAt":"2024-01-01T00:00:00Z"}"#;
        let parsed: Event<Points> = Event::from_json_line(json).unwrap();
        assert_eq!(parsed.payload, Points::Unknown);
        assert_eq!(parsed.event_type, "PointsSquared");
    }

    #[test]
    fn test_meta_drops_payload() {
        let event = Event::new(StreamCursor::new("ledger", "1", 3), Points::Multiplied { factor: 2 });
        let meta = event.meta();
        assert_eq!(meta.event_type, "PointsMultiplied");
        assert_eq!(meta.cursor.offset, 3);
        assert_eq!(meta.captured_at, event.captured_at);
    }
}
