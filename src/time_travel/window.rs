//! EventWindowManager - bounded random access into a stream
//!
//! Only `window_size` events are materialized at a time. While loading the
//! first window the manager scans the rest of the stream once and records a
//! sparse index entry every `sparse_interval` events:
//!
//! ```text
//! seq:     0    1    2   ...  100  101  ...  200  ...
//! index:  [0]                [100]          [200]
//! window:           [ 90 ............ 340 ]
//! ```
//!
//! Any position can then be reloaded by seeking to the nearest index entry
//! at or before it and scanning forward from there.

use std::ops::Range;
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::adapter::{EventStream, StreamAdapter};
use crate::error::{ensure_not_cancelled, EngineResult};
use crate::types::{Event, EventPayload, SparseIndexEntry, StreamAddress};

pub struct EventWindowManager<E: EventPayload> {
    streams: Arc<dyn StreamAdapter<E>>,
    address: StreamAddress,
    window_size: usize,
    sparse_interval: usize,
    window: Vec<Event<E>>,
    /// Sequence position of `window[0]`
    window_start: usize,
    sparse_index: Vec<SparseIndexEntry>,
    total_events: usize,
}

impl<E: EventPayload> EventWindowManager<E> {
    pub fn new(
        streams: Arc<dyn StreamAdapter<E>>,
        address: StreamAddress,
        window_size: usize,
        sparse_interval: usize,
    ) -> Self {
        Self {
            streams,
            address,
            window_size: window_size.max(1),
            sparse_interval: sparse_interval.max(1),
            window: Vec::new(),
            window_start: 0,
            sparse_index: Vec::new(),
            total_events: 0,
        }
    }

    /// Load the first window from `start_offset` and index the whole remaining stream
    ///
    /// Sequence position 0 is the first event at or after `start_offset`.
    pub async fn initialize(&mut self, start_offset: i64, cancel: &CancellationToken) -> EngineResult<()> {
        ensure_not_cancelled(cancel)?;
        let mut events = self.streams.get_events(&self.address.at(start_offset.max(0)));

        let mut window = Vec::with_capacity(self.window_size);
        let mut sparse_index = Vec::new();
        let mut seq = 0usize;
        while let Some(event) = events.next().await {
            let event = event?;
            ensure_not_cancelled(cancel)?;

            if seq % self.sparse_interval == 0 {
                sparse_index.push(SparseIndexEntry {
                    seq,
                    offset: event.offset(),
                    timestamp: event.captured_at,
                });
            }
            if window.len() < self.window_size {
                window.push(event);
            }
            seq += 1;
        }

        self.window = window;
        self.window_start = 0;
        self.sparse_index = sparse_index;
        self.total_events = seq;

        tracing::debug!(
            stream = %self.address,
            total = self.total_events,
            index_entries = self.sparse_index.len(),
            "event window initialized"
        );
        Ok(())
    }

    /// Replace the window with up to `window_size` events starting at `start_index`
    pub async fn load_window_from_index(
        &mut self,
        start_index: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<()> {
        if start_index >= self.total_events {
            self.window.clear();
            self.window_start = start_index;
            return Ok(());
        }

        let pos = self.sparse_index.partition_point(|entry| entry.seq <= start_index);
        let Some(entry) = pos.checked_sub(1).map(|i| self.sparse_index[i]) else {
            self.window.clear();
            self.window_start = start_index;
            return Ok(());
        };

        ensure_not_cancelled(cancel)?;
        let mut events = self.streams.get_events(&self.address.at(entry.offset));
        let mut window = Vec::with_capacity(self.window_size);
        let mut seq = entry.seq;
        while let Some(event) = events.next().await {
            let event = event?;
            ensure_not_cancelled(cancel)?;
            if seq >= start_index {
                window.push(event);
                if window.len() >= self.window_size {
                    break;
                }
            }
            seq += 1;
        }

        tracing::trace!(
            stream = %self.address,
            start = start_index,
            len = window.len(),
            "event window reloaded"
        );
        self.window = window;
        self.window_start = start_index;
        Ok(())
    }

    /// Make sure the event at `index` is materialized
    ///
    /// Reloads with a quarter-window lookback (at least one event when the
    /// window holds two or more) so nearby moves in either direction stay
    /// cached. Returns `false` when `index` is out of range.
    pub async fn ensure_event_in_window(
        &mut self,
        index: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<bool> {
        if index >= self.total_events {
            return Ok(false);
        }
        if self.is_windowed(index) {
            return Ok(true);
        }

        // keep at least one event behind `index` whenever the window allows it
        let lookback = (self.window_size / 4).max(1).min(self.window_size - 1);
        let start = index.saturating_sub(lookback);
        self.load_window_from_index(start, cancel).await?;
        Ok(self.is_windowed(index))
    }

    /// Event at `index` if it is currently windowed
    ///
    /// `None` both for out-of-range and for not-yet-loaded positions; call
    /// [`ensure_event_in_window`](Self::ensure_event_in_window) first.
    pub fn get_event_at_index(&self, index: usize) -> Option<&Event<E>> {
        if !self.is_windowed(index) {
            return None;
        }
        self.window.get(index - self.window_start)
    }

    fn is_windowed(&self, index: usize) -> bool {
        self.window_range().contains(&index)
    }

    /// Sequence positions currently materialized
    pub fn window_range(&self) -> Range<usize> {
        self.window_start..self.window_start + self.window.len()
    }

    pub fn total_events(&self) -> usize {
        self.total_events
    }

    pub fn sparse_index(&self) -> &[SparseIndexEntry] {
        &self.sparse_index
    }

    /// Stored events from `offset` onwards, bypassing the window
    pub(crate) fn events_from(&self, offset: i64) -> EventStream<E> {
        self.streams.get_events(&self.address.at(offset))
    }
}
