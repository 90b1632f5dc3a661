//! Snapshot types
//!
//! A snapshot is a persisted `(offset, state)` pair for one view. Replays
//! start from the snapshot instead of the beginning of the stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cursor::{ViewAddress, NO_OFFSET};

/// Latest snapshot as returned by a snapshot adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot<S> {
    /// Offset of the last event folded into `state` (`-1` when empty)
    pub offset: i64,

    /// When the snapshot was written
    #[serde(rename = "storedAt", default, skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<S>,
}

impl<S> StoredSnapshot<S> {
    /// The "no snapshot" sentinel
    pub fn empty() -> Self {
        Self {
            offset: NO_OFFSET,
            stored_at: None,
            state: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none()
    }
}

impl<S> Default for StoredSnapshot<S> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Snapshot write request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData<S> {
    pub view: ViewAddress,
    pub offset: i64,
    #[serde(rename = "storedAt")]
    pub stored_at: DateTime<Utc>,
    pub state: S,
}

impl<S> SnapshotData<S> {
    /// The stored form of this write
    pub fn into_stored(self) -> StoredSnapshot<S> {
        StoredSnapshot {
            offset: self.offset,
            stored_at: Some(self.stored_at),
            state: Some(self.state),
        }
    }
}
