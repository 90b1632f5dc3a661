//! In-memory adapters
//!
//! Thread-safe, process-local storage. Events live in one sorted vector
//! per stream; `get_events` re-reads the vector on every poll so events
//! stored while a reader is consuming become visible to it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use crate::error::{EngineError, EngineResult};
use crate::types::{
    Event, OutboxMessage, SnapshotData, StoreResult, StoredSnapshot, StreamAddress, StreamCursor,
    ViewAddress, NO_OFFSET,
};

use super::{batch_address, check_append, EventStream, SnapshotAdapter, StreamAdapter};

type EventLog<E> = Arc<RwLock<HashMap<StreamAddress, Vec<Event<E>>>>>;

/// In-memory event log with `(stream, offset)` uniqueness
pub struct MemoryStreamAdapter<E> {
    streams: EventLog<E>,
    outbox: RwLock<Vec<OutboxMessage>>,
    fetches: Arc<AtomicUsize>,
    injected_failure: Mutex<Option<String>>,
}

impl<E> Default for MemoryStreamAdapter<E> {
    fn default() -> Self {
        Self {
            streams: Arc::new(RwLock::new(HashMap::new())),
            outbox: RwLock::new(Vec::new()),
            fetches: Arc::new(AtomicUsize::new(0)),
            injected_failure: Mutex::new(None),
        }
    }
}

impl<E: Clone + Send + Sync + 'static> MemoryStreamAdapter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter pre-loaded with already-stored events (no concurrency check)
    pub fn with_events(events: Vec<Event<E>>) -> Self {
        let adapter = Self::new();
        {
            let mut streams = adapter.streams.write();
            for event in events {
                let log = streams.entry(event.cursor.address.clone()).or_default();
                log.push(event);
            }
            for log in streams.values_mut() {
                log.sort_by_key(|e| e.offset());
            }
        }
        adapter
    }

    /// All stored events of one stream
    pub fn events(&self, address: &StreamAddress) -> Vec<Event<E>> {
        self.streams.read().get(address).cloned().unwrap_or_default()
    }

    /// All outbox messages stored so far
    pub fn messages(&self) -> Vec<OutboxMessage> {
        self.outbox.read().clone()
    }

    /// Number of event fetches issued through `get_events`
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Make the next `store_stream` fail with an adapter error
    pub fn fail_next_store(&self, message: impl Into<String>) {
        *self.injected_failure.lock() = Some(message.into());
    }
}

#[async_trait]
impl<E: Clone + Send + Sync + 'static> StreamAdapter<E> for MemoryStreamAdapter<E> {
    fn get_events(&self, cursor: &StreamCursor) -> EventStream<E> {
        let streams = Arc::clone(&self.streams);
        let fetches = Arc::clone(&self.fetches);
        let address = cursor.address.clone();
        let mut next = cursor.offset;

        Box::pin(async_stream::stream! {
            fetches.fetch_add(1, Ordering::SeqCst);
            loop {
                let event = {
                    let guard = streams.read();
                    guard.get(&address).and_then(|log| {
                        let pos = log.partition_point(|e| e.offset() < next);
                        log.get(pos).cloned()
                    })
                };
                match event {
                    Some(event) => {
                        next = event.offset() + 1;
                        yield Ok(event);
                    }
                    None => break,
                }
            }
        })
    }

    async fn get_last_offset(&self, address: &StreamAddress) -> EngineResult<i64> {
        Ok(self
            .streams
            .read()
            .get(address)
            .and_then(|log| log.last())
            .map(|e| e.offset())
            .unwrap_or(NO_OFFSET))
    }

    async fn store_stream(
        &self,
        events: Vec<Event<E>>,
        messages: Vec<OutboxMessage>,
    ) -> EngineResult<StoreResult> {
        if let Some(message) = self.injected_failure.lock().take() {
            return Err(EngineError::Adapter(message));
        }
        if events.is_empty() && messages.is_empty() {
            return Ok(StoreResult::default());
        }

        let result = StoreResult::count(events.len(), &messages);
        if !events.is_empty() {
            let mut streams = self.streams.write();
            let address = batch_address(&events)?.clone();
            let log = streams.entry(address).or_default();
            let last = log.last().map(|e| e.offset()).unwrap_or(NO_OFFSET);
            check_append(&events, last)?;

            let stored_at = Utc::now();
            log.extend(events.into_iter().map(|mut e| {
                e.stored_at = Some(stored_at);
                e
            }));
        }
        self.outbox.write().extend(messages);
        Ok(result)
    }

    async fn close(&self) -> EngineResult<()> {
        Ok(())
    }
}

/// In-memory latest-snapshot store
pub struct MemorySnapshotAdapter<S> {
    snapshots: RwLock<HashMap<ViewAddress, StoredSnapshot<S>>>,
    writes: AtomicUsize,
}

impl<S> Default for MemorySnapshotAdapter<S> {
    fn default() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
        }
    }
}

impl<S: Clone + Send + Sync + 'static> MemorySnapshotAdapter<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a snapshot directly
    pub fn insert(&self, view: ViewAddress, snapshot: StoredSnapshot<S>) {
        self.snapshots.write().insert(view, snapshot);
    }

    /// Number of `store_snapshot` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: Clone + Send + Sync + 'static> SnapshotAdapter<S> for MemorySnapshotAdapter<S> {
    async fn get_snapshot(&self, view: &ViewAddress) -> EngineResult<StoredSnapshot<S>> {
        Ok(self
            .snapshots
            .read()
            .get(view)
            .cloned()
            .unwrap_or_else(StoredSnapshot::empty))
    }

    async fn store_snapshot(&self, snapshot: SnapshotData<S>) -> EngineResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let view = snapshot.view.clone();
        self.snapshots.write().insert(view, snapshot.into_stored());
        Ok(())
    }
}
