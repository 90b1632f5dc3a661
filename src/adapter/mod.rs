//! Storage adapter interfaces
//!
//! The engine never talks to storage directly. Callers own adapters and
//! hand them in as `Arc<dyn ...>`; the engine only borrows them.
//!
//! - `StreamAdapter`: append-only event log with optimistic concurrency
//! - `SnapshotAdapter`: latest `(offset, state)` per view
//!
//! Two implementations ship with the crate: in-memory (`memory`) and
//! JSON-lines files on disk (`jsonl`).

mod jsonl;
mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::{EngineError, EngineResult};
use crate::types::{
    Event, OutboxMessage, SnapshotData, StoreResult, StoredSnapshot, StreamAddress, StreamCursor,
    ViewAddress,
};

pub use jsonl::{JsonlConfig, JsonlSnapshotAdapter, JsonlStreamAdapter};
pub use memory::{MemorySnapshotAdapter, MemoryStreamAdapter};

/// Lazily-fetched sequence of events
pub type EventStream<E> = BoxStream<'static, EngineResult<Event<E>>>;

/// Event log capabilities consumed by the engine
#[async_trait]
pub trait StreamAdapter<E: Send + 'static>: Send + Sync {
    /// All events of `cursor.address` with offset `>= cursor.offset`, ascending
    ///
    /// Implementations fetch as the stream is polled.
    fn get_events(&self, cursor: &StreamCursor) -> EventStream<E>;

    /// Offset of the last stored event, `-1` when the stream is empty
    async fn get_last_offset(&self, address: &StreamAddress) -> EngineResult<i64>;

    /// Persist events and outbox messages atomically
    ///
    /// Must fail with `EngineError::ConcurrencyConflict` when an event
    /// already exists at (or beyond) the first offset being written.
    async fn store_stream(
        &self,
        events: Vec<Event<E>>,
        messages: Vec<OutboxMessage>,
    ) -> EngineResult<StoreResult>;

    async fn close(&self) -> EngineResult<()>;
}

/// Snapshot capabilities consumed by the engine
#[async_trait]
pub trait SnapshotAdapter<S: Send + 'static>: Send + Sync {
    /// Latest snapshot, or `StoredSnapshot::empty()` when none exists
    async fn get_snapshot(&self, view: &ViewAddress) -> EngineResult<StoredSnapshot<S>>;

    async fn store_snapshot(&self, snapshot: SnapshotData<S>) -> EngineResult<()>;
}

/// Validate that `events` form a contiguous batch on one stream
pub(crate) fn batch_address<E>(events: &[Event<E>]) -> EngineResult<&StreamAddress> {
    let first = events
        .first()
        .ok_or_else(|| EngineError::InvalidArgument("empty event batch".to_string()))?;
    let address = &first.cursor.address;
    for pair in events.windows(2) {
        if pair[1].cursor.address != *address {
            return Err(EngineError::InvalidArgument(
                "event batch spans more than one stream".to_string(),
            ));
        }
        if pair[1].offset() != pair[0].offset() + 1 {
            return Err(EngineError::InvalidArgument(format!(
                "event batch offsets are not contiguous: {} then {}",
                pair[0].offset(),
                pair[1].offset()
            )));
        }
    }
    Ok(address)
}

/// Check the batch against the last stored offset
pub(crate) fn check_append<E>(events: &[Event<E>], last_offset: i64) -> EngineResult<()> {
    let address = batch_address(events)?;
    let first = events[0].offset();
    if first <= last_offset {
        return Err(EngineError::ConcurrencyConflict {
            address: address.clone(),
            offset: first,
        });
    }
    if first != last_offset.max(0) + 1 {
        return Err(EngineError::InvalidArgument(format!(
            "offset gap on stream {}: last stored {}, next {}",
            address, last_offset, first
        )));
    }
    Ok(())
}
