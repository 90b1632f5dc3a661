//! ReplayEngine - rebuild a view's state at any past point
//!
//! Stateless: every call fetches the latest snapshot (when allowed), picks
//! a starting offset and folds events until the target is exceeded.
//!
//! Snapshot use differs by target kind:
//! - offset: a snapshot at or past the target is discarded and the replay
//!   starts from the beginning; otherwise replay resumes after it
//! - timestamp: a snapshot is used only when it was stored at or before
//!   the target instant

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::adapter::{SnapshotAdapter, StreamAdapter};
use crate::error::{ensure_not_cancelled, EngineResult};
use crate::types::{Event, ReplayTarget, StepResult, StreamAddress, ViewAddress, NO_OFFSET};
use crate::view::Reducer;

/// Options shared by replay calls
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Start from the latest stored snapshot when it qualifies
    pub use_snapshot: bool,
    pub cancel: CancellationToken,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            use_snapshot: true,
            cancel: CancellationToken::new(),
        }
    }
}

impl ReplayOptions {
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn without_snapshot(mut self) -> Self {
        self.use_snapshot = false;
        self
    }
}

/// Lazy sequence of replay steps
pub type StepStream<R> =
    BoxStream<'static, EngineResult<StepResult<<R as Reducer>::State, <R as Reducer>::Event>>>;

/// Replays one view over one stream
pub struct ReplayEngine<R: Reducer> {
    reducer: Arc<R>,
    view: ViewAddress,
    streams: Arc<dyn StreamAdapter<R::Event>>,
    snapshots: Arc<dyn SnapshotAdapter<R::State>>,
}

impl<R: Reducer> Clone for ReplayEngine<R> {
    fn clone(&self) -> Self {
        Self {
            reducer: Arc::clone(&self.reducer),
            view: self.view.clone(),
            streams: Arc::clone(&self.streams),
            snapshots: Arc::clone(&self.snapshots),
        }
    }
}

impl<R: Reducer> ReplayEngine<R> {
    pub fn new(
        reducer: Arc<R>,
        stream: StreamAddress,
        streams: Arc<dyn StreamAdapter<R::Event>>,
        snapshots: Arc<dyn SnapshotAdapter<R::State>>,
    ) -> Self {
        let view = ViewAddress::new(reducer.view_name(), stream);
        Self {
            reducer,
            view,
            streams,
            snapshots,
        }
    }

    pub fn view(&self) -> &ViewAddress {
        &self.view
    }

    pub fn reducer(&self) -> &Arc<R> {
        &self.reducer
    }

    pub fn initial_state(&self) -> R::State {
        self.reducer.initial_state()
    }

    pub(crate) fn streams(&self) -> &Arc<dyn StreamAdapter<R::Event>> {
        &self.streams
    }

    pub(crate) fn snapshots(&self) -> &Arc<dyn SnapshotAdapter<R::State>> {
        &self.snapshots
    }

    /// Offset to start streaming from and the state to start with
    async fn starting_point(
        &self,
        target: &ReplayTarget,
        options: &ReplayOptions,
    ) -> EngineResult<(i64, R::State)> {
        if !options.use_snapshot {
            return Ok((0, self.initial_state()));
        }

        ensure_not_cancelled(&options.cancel)?;
        let snapshot = self.snapshots.get_snapshot(&self.view).await?;
        let usable = match target {
            ReplayTarget::Offset(offset) => snapshot.offset < *offset,
            ReplayTarget::Timestamp(ts) => snapshot.stored_at.is_some_and(|at| at <= *ts),
        };

        match snapshot.state {
            Some(state) if usable && snapshot.offset > NO_OFFSET => Ok((snapshot.offset + 1, state)),
            _ => Ok((0, self.initial_state())),
        }
    }

    /// State after applying every event up to `target`
    pub async fn replay_to(
        &self,
        target: ReplayTarget,
        options: ReplayOptions,
    ) -> EngineResult<R::State> {
        let (_, state) = self.replay_to_position(target, options).await?;
        Ok(state)
    }

    /// Like [`replay_to`](Self::replay_to), also returning the offset the state reflects
    ///
    /// That is the last applied event, the snapshot's offset when the
    /// snapshot already covers the target, or `-1` when nothing qualifies.
    pub(crate) async fn replay_to_position(
        &self,
        target: ReplayTarget,
        options: ReplayOptions,
    ) -> EngineResult<(i64, R::State)> {
        ensure_not_cancelled(&options.cancel)?;
        if let ReplayTarget::Offset(offset) = target {
            if offset < 0 {
                return Ok((NO_OFFSET, self.initial_state()));
            }
        }

        let (start, mut state) = self.starting_point(&target, &options).await?;
        let mut position = start - 1;

        ensure_not_cancelled(&options.cancel)?;
        let mut events = self.streams.get_events(&self.view.stream.at(start));
        while let Some(event) = events.next().await {
            let event = event?;
            ensure_not_cancelled(&options.cancel)?;
            if target.is_exceeded_by(&event) {
                break;
            }
            self.reducer.reduce(&mut state, &event);
            position = event.offset();
        }
        Ok((position, state))
    }

    /// State after the event at `offset`; negative offsets never touch storage
    pub async fn replay_to_offset(&self, offset: i64, options: ReplayOptions) -> EngineResult<R::State> {
        self.replay_to(ReplayTarget::Offset(offset), options).await
    }

    /// State after the last event captured at or before `ts`
    pub async fn replay_to_timestamp(
        &self,
        ts: DateTime<Utc>,
        options: ReplayOptions,
    ) -> EngineResult<R::State> {
        self.replay_to(ReplayTarget::Timestamp(ts), options).await
    }

    /// State after the last stored event
    pub async fn get_latest_state(&self, options: ReplayOptions) -> EngineResult<R::State> {
        ensure_not_cancelled(&options.cancel)?;
        let last = self.streams.get_last_offset(&self.view.stream).await?;
        if last < 0 {
            return Ok(self.initial_state());
        }
        self.replay_to(ReplayTarget::Offset(last), options).await
    }

    /// Lazily yield one step per applied event up to `target`
    ///
    /// No I/O happens until the returned stream is polled. The last step
    /// has `is_at_end` set once either the stream head or the target offset
    /// is reached. A step is not produced for the snapshot itself.
    pub fn replay(&self, target: ReplayTarget, options: ReplayOptions) -> StepStream<R> {
        let engine = self.clone();

        Box::pin(async_stream::stream! {
            if let ReplayTarget::Offset(offset) = target {
                if offset < 0 {
                    return;
                }
            }
            if let Err(e) = ensure_not_cancelled(&options.cancel) {
                yield Err(e);
                return;
            }

            let last = match engine.streams.get_last_offset(&engine.view.stream).await {
                Ok(last) => last,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            if last < 0 {
                return;
            }

            let (start, mut state) = match engine.starting_point(&target, &options).await {
                Ok(start) => start,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut events = engine.streams.get_events(&engine.view.stream.at(start));
            loop {
                if let Err(e) = ensure_not_cancelled(&options.cancel) {
                    yield Err(e);
                    return;
                }
                let event = match events.next().await {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => {
                        yield Err(e);
                        return;
                    }
                    None => break,
                };
                if let Err(e) = ensure_not_cancelled(&options.cancel) {
                    yield Err(e);
                    return;
                }
                if target.is_exceeded_by(&event) {
                    break;
                }

                engine.reducer.reduce(&mut state, &event);
                let offset = event.offset();
                let is_at_end = offset >= last
                    || matches!(target, ReplayTarget::Offset(t) if offset >= t);
                yield Ok(StepResult {
                    state: state.clone(),
                    timestamp: Some(event.captured_at),
                    offset,
                    event: Some(event),
                    is_at_end,
                });
                if is_at_end {
                    break;
                }
            }
        })
    }

    /// Stored events with `from <= offset <= to`
    ///
    /// `from` is clamped to 0; an inverted range is empty, not an error.
    pub async fn get_events_in_range(
        &self,
        from: i64,
        to: i64,
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<Event<R::Event>>> {
        let from = from.max(0);
        if to < from {
            return Ok(Vec::new());
        }

        ensure_not_cancelled(cancel)?;
        let mut events = self.streams.get_events(&self.view.stream.at(from));
        let mut range = Vec::new();
        while let Some(event) = events.next().await {
            let event = event?;
            ensure_not_cancelled(cancel)?;
            if event.offset() > to {
                break;
            }
            range.push(event);
        }
        Ok(range)
    }
}
