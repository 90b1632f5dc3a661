//! Views (projections)
//!
//! A view folds one stream's events into queryable state through a
//! [`Reducer`]. It tracks two positions:
//!
//! - `memory_offset`: last event applied in memory
//! - `store_offset`: last offset confirmed persisted in a snapshot
//!
//! `memory_offset >= store_offset` always holds, and applying an event at
//! or below `memory_offset` is a silent no-op, so duplicate or replayed
//! deliveries are safe.

mod policy;
mod reducer;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::adapter::{SnapshotAdapter, StreamAdapter};
use crate::error::{ensure_not_cancelled, EngineResult};
use crate::types::{Event, EventPayload, SnapshotData, StreamAddress, ViewAddress, NO_OFFSET};
use crate::utils::millis_since;

pub use policy::{SnapshotPolicy, SnapshotPredicate};
pub use reducer::{fold, Reducer};

/// A projection over one stream
pub struct View<R: Reducer> {
    reducer: Arc<R>,
    address: ViewAddress,
    snapshots: Arc<dyn SnapshotAdapter<R::State>>,
    policy: SnapshotPolicy,
    state: R::State,
    memory_offset: i64,
    store_offset: i64,
    stored_at: Option<DateTime<Utc>>,
}

impl<R: Reducer> View<R> {
    /// Empty view at the reducer's initial state
    pub fn new(
        reducer: Arc<R>,
        stream: StreamAddress,
        snapshots: Arc<dyn SnapshotAdapter<R::State>>,
    ) -> Self {
        let address = ViewAddress::new(reducer.view_name(), stream);
        let state = reducer.initial_state();
        Self {
            reducer,
            address,
            snapshots,
            policy: SnapshotPolicy::default(),
            state,
            memory_offset: NO_OFFSET,
            store_offset: NO_OFFSET,
            stored_at: None,
        }
    }

    pub fn with_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn address(&self) -> &ViewAddress {
        &self.address
    }

    pub fn state(&self) -> &R::State {
        &self.state
    }

    pub fn memory_offset(&self) -> i64 {
        self.memory_offset
    }

    pub fn store_offset(&self) -> i64 {
        self.store_offset
    }

    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        self.stored_at
    }

    /// Apply one event; returns whether it advanced the view
    ///
    /// Events at or below `memory_offset` are ignored.
    pub fn apply_event(&mut self, event: &Event<R::Event>) -> bool {
        if event.offset() <= self.memory_offset {
            return false;
        }
        self.reducer.reduce(&mut self.state, event);
        self.memory_offset = event.offset();
        true
    }

    /// Replace in-memory state with the latest stored snapshot, if any
    pub async fn load_snapshot(&mut self) -> EngineResult<bool> {
        let snapshot = self.snapshots.get_snapshot(&self.address).await?;
        match snapshot.state {
            Some(state) => {
                self.state = state;
                self.memory_offset = snapshot.offset;
                self.store_offset = snapshot.offset;
                self.stored_at = snapshot.stored_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply every stored event after `memory_offset`
    pub async fn catch_up(
        &mut self,
        streams: &dyn StreamAdapter<R::Event>,
        cancel: &CancellationToken,
    ) -> EngineResult<usize> {
        ensure_not_cancelled(cancel)?;
        let mut events = streams.get_events(&self.address.stream.at(self.memory_offset + 1));
        let mut applied = 0;
        while let Some(event) = events.next().await {
            let event = event?;
            ensure_not_cancelled(cancel)?;
            if self.apply_event(&event) {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Persist a snapshot if there is anything new and the policy agrees
    ///
    /// Returns whether a snapshot was written.
    pub async fn store(&mut self) -> EngineResult<bool> {
        // offsets start at 1, so an unsaved view counts from 0
        let offset_gap = self.memory_offset - self.store_offset.max(0);
        if offset_gap <= 0 {
            return Ok(false);
        }

        let now = Utc::now();
        if !self.policy.should_store(offset_gap, millis_since(self.stored_at, now)) {
            return Ok(false);
        }

        self.snapshots
            .store_snapshot(SnapshotData {
                view: self.address.clone(),
                offset: self.memory_offset,
                stored_at: now,
                state: self.state.clone(),
            })
            .await?;

        self.store_offset = self.memory_offset;
        self.stored_at = Some(now);
        tracing::trace!(view = %self.address, offset = self.store_offset, "view snapshot stored");
        Ok(true)
    }
}

/// Type-erased view as seen by a [`Stream`](crate::stream::Stream)
///
/// Lets one stream fan events out to views with different state types.
#[async_trait]
pub trait StreamView<E: EventPayload>: Send + Sync {
    fn address(&self) -> &ViewAddress;

    fn memory_offset(&self) -> i64;

    /// See [`View::apply_event`]
    fn apply_event(&mut self, event: &Event<E>) -> bool;

    /// Current state for downcasting
    fn state_any(&self) -> &dyn Any;

    /// Load the latest snapshot, then catch up to the stream head
    async fn hydrate(
        &mut self,
        streams: &dyn StreamAdapter<E>,
        cancel: &CancellationToken,
    ) -> EngineResult<()>;

    /// See [`View::store`]
    async fn store(&mut self) -> EngineResult<bool>;
}

#[async_trait]
impl<R: Reducer> StreamView<R::Event> for View<R> {
    fn address(&self) -> &ViewAddress {
        &self.address
    }

    fn memory_offset(&self) -> i64 {
        self.memory_offset
    }

    fn apply_event(&mut self, event: &Event<R::Event>) -> bool {
        View::apply_event(self, event)
    }

    fn state_any(&self) -> &dyn Any {
        &self.state
    }

    async fn hydrate(
        &mut self,
        streams: &dyn StreamAdapter<R::Event>,
        cancel: &CancellationToken,
    ) -> EngineResult<()> {
        ensure_not_cancelled(cancel)?;
        self.load_snapshot().await?;
        let applied = self.catch_up(streams, cancel).await?;
        tracing::debug!(
            view = %self.address,
            offset = self.memory_offset,
            applied,
            "view hydrated"
        );
        Ok(())
    }

    async fn store(&mut self) -> EngineResult<bool> {
        View::store(self).await
    }
}
