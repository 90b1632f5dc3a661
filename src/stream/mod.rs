//! Stream - the write side
//!
//! A `Stream` appends events to one `(stream_type, stream_id)`:
//!
//! ```text
//! append_event()                       store()
//! ┌──────────────┐   ┌─────────────┐   ┌────────────────────┐   ┌─────────────────┐
//! │ next cursor  │──►│ apply to    │──►│ adapter.store_     │──►│ views store     │
//! │ build Event  │   │ every view, │   │ stream(events,     │   │ snapshots       │
//! │              │   │ outbox msgs │   │ messages) + OCC    │   │ concurrently    │
//! └──────────────┘   └─────────────┘   └────────────────────┘   └─────────────────┘
//! ```
//!
//! Everything stays in memory until `store()`. Conflicts surface as
//! `EngineError::ConcurrencyConflict`; the stream never retries. After a
//! failed `store()` the views already contain the pending events, so the
//! caller should discard the stream and reopen it.

mod producer;

use std::sync::Arc;

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;

use crate::adapter::StreamAdapter;
use crate::error::{ensure_not_cancelled, EngineResult};
use crate::types::{
    Event, EventMeta, EventPayload, OutboxMessage, StoreResult, StreamAddress, StreamCursor,
    NO_OFFSET,
};
use crate::view::StreamView;

pub use producer::{MessageProducer, ViewStates};

/// Append-only writer for one stream
pub struct Stream<E: EventPayload> {
    address: StreamAddress,
    adapter: Arc<dyn StreamAdapter<E>>,
    views: Vec<Box<dyn StreamView<E>>>,
    producer: Option<MessageProducer<E>>,
    stored_offset: i64,
    pending_events: Vec<Event<E>>,
    pending_messages: Vec<OutboxMessage>,
}

impl<E: EventPayload> Stream<E> {
    /// Writer for a stream assumed empty; call [`open`](Self::open) for an existing one
    pub fn new(address: StreamAddress, adapter: Arc<dyn StreamAdapter<E>>) -> Self {
        Self {
            address,
            adapter,
            views: Vec::new(),
            producer: None,
            stored_offset: NO_OFFSET,
            pending_events: Vec::new(),
            pending_messages: Vec::new(),
        }
    }

    /// Register a view that receives every appended event
    pub fn with_view(mut self, view: impl StreamView<E> + 'static) -> Self {
        self.views.push(Box::new(view));
        self
    }

    /// Register the outbox message producer
    pub fn with_message_producer<F>(mut self, producer: F) -> Self
    where
        F: Fn(&Event<E>, &ViewStates<'_, E>) -> Vec<OutboxMessage> + Send + Sync + 'static,
    {
        self.producer = Some(Box::new(producer));
        self
    }

    /// Read the stored head and bring every view up to it
    pub async fn open(mut self, cancel: &CancellationToken) -> EngineResult<Self> {
        ensure_not_cancelled(cancel)?;
        self.stored_offset = self.adapter.get_last_offset(&self.address).await?;

        let adapter = Arc::clone(&self.adapter);
        for view in &mut self.views {
            view.hydrate(adapter.as_ref(), cancel).await?;
        }

        tracing::debug!(
            stream = %self.address,
            offset = self.stored_offset,
            views = self.views.len(),
            "stream opened"
        );
        Ok(self)
    }

    pub fn address(&self) -> &StreamAddress {
        &self.address
    }

    /// Offset of the last event confirmed stored
    pub fn stored_offset(&self) -> i64 {
        self.stored_offset
    }

    pub fn pending_events(&self) -> &[Event<E>] {
        &self.pending_events
    }

    pub fn pending_messages(&self) -> &[OutboxMessage] {
        &self.pending_messages
    }

    /// Current states of the registered views
    pub fn view_states(&self) -> ViewStates<'_, E> {
        ViewStates::new(&self.views)
    }

    fn next_cursor(&self) -> StreamCursor {
        match self.pending_events.last() {
            Some(event) => event.cursor.next(),
            None => self.address.at(self.stored_offset.max(0) + 1),
        }
    }

    /// Append one event in memory
    ///
    /// Applies it to every view and collects outbox messages. Nothing is
    /// persisted until [`store`](Self::store).
    pub fn append_event(&mut self, payload: E, captured_by: Option<&str>) -> EventMeta {
        let mut event = Event::new(self.next_cursor(), payload);
        if let Some(author) = captured_by {
            event = event.with_author(author);
        }

        for view in &mut self.views {
            view.apply_event(&event);
        }

        if let Some(producer) = &self.producer {
            let states = ViewStates::new(&self.views);
            let messages = producer(&event, &states);
            self.pending_messages.extend(
                messages
                    .into_iter()
                    .map(|m| if m.cursor.is_some() { m } else { m.with_cursor(event.cursor.clone()) }),
            );
        }

        let meta = event.meta();
        self.pending_events.push(event);
        meta
    }

    /// Persist pending events and messages, then let views save snapshots
    pub async fn store(&mut self) -> EngineResult<StoreResult> {
        let Some(last) = self.pending_events.last() else {
            return Ok(StoreResult::default());
        };
        let last_offset = last.offset();

        let result = self
            .adapter
            .store_stream(self.pending_events.clone(), self.pending_messages.clone())
            .await?;

        self.stored_offset = last_offset;
        self.pending_events.clear();
        self.pending_messages.clear();

        try_join_all(self.views.iter_mut().map(|view| view.store())).await?;

        tracing::debug!(
            stream = %self.address,
            offset = self.stored_offset,
            events = result.num_events,
            "stream stored"
        );
        Ok(result)
    }
}
