//! Replay targets and step results for time travel

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

use super::event::Event;

/// Where a replay should stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplayTarget {
    /// Stop after the event at this offset (inclusive)
    Offset(i64),
    /// Stop after the last event captured at or before this instant
    Timestamp(DateTime<Utc>),
}

impl ReplayTarget {
    /// Parse an RFC 3339 timestamp target
    pub fn parse_timestamp(input: &str) -> EngineResult<Self> {
        DateTime::parse_from_rfc3339(input.trim())
            .map(|ts| ReplayTarget::Timestamp(ts.with_timezone(&Utc)))
            .map_err(|e| EngineError::InvalidArgument(format!("invalid timestamp '{}': {}", input, e)))
    }

    /// Timestamp target from Unix milliseconds
    pub fn from_timestamp_millis(millis: i64) -> EngineResult<Self> {
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(ReplayTarget::Timestamp)
            .ok_or_else(|| EngineError::InvalidArgument(format!("timestamp out of range: {}", millis)))
    }

    /// Whether `event` lies past this target
    pub fn is_exceeded_by<E>(&self, event: &Event<E>) -> bool {
        match self {
            ReplayTarget::Offset(offset) => event.offset() > *offset,
            ReplayTarget::Timestamp(ts) => event.captured_at > *ts,
        }
    }
}

impl From<i64> for ReplayTarget {
    fn from(offset: i64) -> Self {
        ReplayTarget::Offset(offset)
    }
}

impl From<DateTime<Utc>> for ReplayTarget {
    fn from(ts: DateTime<Utc>) -> Self {
        ReplayTarget::Timestamp(ts)
    }
}

/// One position reached while replaying or stepping
///
/// `offset == -1` with no event means "before the first event".
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult<S, E> {
    pub state: S,
    pub event: Option<Event<E>>,
    pub offset: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub is_at_end: bool,
}

/// Sparse index sample: every Nth event of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseIndexEntry {
    /// Zero-based position in the full event sequence
    pub seq: usize,
    pub offset: i64,
    pub timestamp: DateTime<Utc>,
}
