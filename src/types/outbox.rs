//! Outbox messages derived from events and stored atomically with them

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::cursor::StreamCursor;

/// An integration message produced while appending an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// Destination channel (topic, queue, ...)
    pub channel: String,
    pub payload: serde_json::Value,
    /// Event that produced this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<StreamCursor>,
}

impl OutboxMessage {
    pub fn new(channel: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            channel: channel.into(),
            payload,
            cursor: None,
        }
    }

    pub fn with_cursor(mut self, cursor: StreamCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

/// What a successful `store` persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResult {
    #[serde(rename = "numEvents")]
    pub num_events: usize,
    #[serde(rename = "numMessagesByChannel")]
    pub num_messages_by_channel: BTreeMap<String, usize>,
}

impl StoreResult {
    /// Tally `messages` per channel
    pub fn count(num_events: usize, messages: &[OutboxMessage]) -> Self {
        let mut num_messages_by_channel = BTreeMap::new();
        for message in messages {
            *num_messages_by_channel.entry(message.channel.clone()).or_insert(0) += 1;
        }
        Self {
            num_events,
            num_messages_by_channel,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_events == 0 && self.num_messages_by_channel.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_count_by_channel() {
        let messages = vec![
            OutboxMessage::new("audit", json!({"n": 1})),
            OutboxMessage::new("billing", json!({"n": 2})),
            OutboxMessage::new("audit", json!({"n": 3})),
        ];
        let result = StoreResult::count(2, &messages);
        assert_eq!(result.num_events, 2);
        assert_eq!(result.num_messages_by_channel.get("audit"), Some(&2));
        assert_eq!(result.num_messages_by_channel.get("billing"), Some(&1));
        assert!(!result.is_empty());
        assert!(StoreResult::default().is_empty());
    }
}
