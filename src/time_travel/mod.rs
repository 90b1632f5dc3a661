//! Time travel over a view's history
//!
//! - [`ReplayEngine`]: stateless replay to an offset or instant, or as a lazy
//!   step stream
//! - [`EventStepper`]: stateful forward/backward navigation with checkpoints
//! - [`EventWindowManager`] + [`IndexSearcher`]: bounded random access into
//!   a stream through a sparse index
//! - [`DiffCalculator`]: changed keys between two points
//!
//! [`TimeTraveler`] ties these together for one stream and one view.

mod checkpoint;
mod diff;
mod index;
mod replay;
mod stepper;
mod window;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::adapter::{SnapshotAdapter, StreamAdapter};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::types::{Event, ReplayTarget, StateDiff, StreamAddress, ViewAddress};
use crate::view::Reducer;

pub use checkpoint::CheckpointManager;
pub use diff::{changed_keys, DiffCalculator, DiffOptions, ValueEquals};
pub use index::IndexSearcher;
pub use replay::{ReplayEngine, ReplayOptions, StepStream};
pub use stepper::{EventStepper, StepperOptions};
pub use window::EventWindowManager;

/// Per stream+view entry point to replay, stepping and diffing
pub struct TimeTraveler<R: Reducer> {
    engine: ReplayEngine<R>,
    config: EngineConfig,
}

impl<R: Reducer> TimeTraveler<R> {
    pub fn new(
        reducer: Arc<R>,
        stream: StreamAddress,
        streams: Arc<dyn StreamAdapter<R::Event>>,
        snapshots: Arc<dyn SnapshotAdapter<R::State>>,
    ) -> Self {
        Self {
            engine: ReplayEngine::new(reducer, stream, streams, snapshots),
            config: EngineConfig::default(),
        }
    }

    /// Defaults used by [`stepper`](Self::stepper)
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn view(&self) -> &ViewAddress {
        self.engine.view()
    }

    pub fn engine(&self) -> &ReplayEngine<R> {
        &self.engine
    }

    pub async fn replay_to(&self, target: ReplayTarget, options: ReplayOptions) -> EngineResult<R::State> {
        self.engine.replay_to(target, options).await
    }

    pub async fn replay_to_offset(&self, offset: i64, options: ReplayOptions) -> EngineResult<R::State> {
        self.engine.replay_to_offset(offset, options).await
    }

    pub async fn replay_to_timestamp(
        &self,
        ts: DateTime<Utc>,
        options: ReplayOptions,
    ) -> EngineResult<R::State> {
        self.engine.replay_to_timestamp(ts, options).await
    }

    /// Replay to an instant given in Unix milliseconds
    pub async fn replay_to_timestamp_millis(
        &self,
        millis: i64,
        options: ReplayOptions,
    ) -> EngineResult<R::State> {
        let target = ReplayTarget::from_timestamp_millis(millis)?;
        self.engine.replay_to(target, options).await
    }

    pub async fn get_latest_state(&self, options: ReplayOptions) -> EngineResult<R::State> {
        self.engine.get_latest_state(options).await
    }

    pub fn replay(&self, target: ReplayTarget, options: ReplayOptions) -> StepStream<R> {
        self.engine.replay(target, options)
    }

    pub async fn get_events_in_range(
        &self,
        from: i64,
        to: i64,
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<Event<R::Event>>> {
        self.engine.get_events_in_range(from, to, cancel).await
    }

    /// New independent stepper; nothing is loaded until it is first used
    pub fn create_stepper(&self, options: StepperOptions) -> EventStepper<R> {
        EventStepper::new(
            Arc::clone(self.engine.reducer()),
            self.engine.view().clone(),
            Arc::clone(self.engine.streams()),
            Arc::clone(self.engine.snapshots()),
            options,
        )
    }

    /// Stepper configured from this traveler's [`EngineConfig`]
    pub fn stepper(&self) -> EventStepper<R> {
        self.create_stepper(StepperOptions::from_config(&self.config))
    }
}

impl<R: Reducer> TimeTraveler<R>
where
    R::State: Serialize,
{
    pub async fn diff(
        &self,
        from: ReplayTarget,
        to: ReplayTarget,
        options: DiffOptions,
    ) -> EngineResult<StateDiff<R::State>> {
        DiffCalculator::new(self.engine.clone()).diff(from, to, options).await
    }
}
