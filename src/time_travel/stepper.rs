//! EventStepper - bidirectional navigation through a view's history
//!
//! ```text
//! uninitialized ──first call──► ready
//!                  (snapshot?, window + sparse index, initial checkpoint)
//! ```
//!
//! Position is a zero-based sequence index; `-1` is "before the first
//! event". Forward moves apply events one by one (checkpointing on the
//! way); backward moves restore the nearest checkpoint and replay forward.
//!
//! A stepper owns all of its state. Two steppers over the same stream
//! share nothing and can be driven concurrently; a single stepper takes
//! `&mut self` and is therefore never driven concurrently.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::adapter::{SnapshotAdapter, StreamAdapter};
use crate::config::EngineConfig;
use crate::error::{ensure_not_cancelled, EngineError, EngineResult};
use crate::types::{ReplayTarget, StepResult, ViewAddress, NO_OFFSET};
use crate::view::Reducer;

use super::checkpoint::CheckpointManager;
use super::index::IndexSearcher;
use super::window::EventWindowManager;

/// Options for [`EventStepper`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepperOptions {
    pub checkpoint_interval: usize,
    /// Seed the stepper from the view's latest snapshot
    pub use_snapshot: bool,
    pub window_size: usize,
    pub max_checkpoints: usize,
    pub sparse_index_interval: usize,
}

impl Default for StepperOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl StepperOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            checkpoint_interval: config.checkpoint_interval,
            use_snapshot: false,
            window_size: config.window_size,
            max_checkpoints: config.max_checkpoints,
            sparse_index_interval: config.sparse_index_interval,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        EngineConfig {
            window_size: self.window_size,
            sparse_index_interval: self.sparse_index_interval,
            checkpoint_interval: self.checkpoint_interval,
            max_checkpoints: self.max_checkpoints,
        }
        .validate()
    }
}

/// Navigation state built on first use
struct Ready<R: Reducer> {
    windows: EventWindowManager<R::Event>,
    checkpoints: CheckpointManager<R::State>,
    /// Offset represented by position -1 (snapshot offset or -1)
    initial_offset: i64,
}

pub struct EventStepper<R: Reducer> {
    reducer: Arc<R>,
    view: ViewAddress,
    streams: Arc<dyn StreamAdapter<R::Event>>,
    snapshots: Arc<dyn SnapshotAdapter<R::State>>,
    options: StepperOptions,
    ready: Option<Ready<R>>,
    state: R::State,
    current_index: i64,
}

impl<R: Reducer> EventStepper<R> {
    pub fn new(
        reducer: Arc<R>,
        view: ViewAddress,
        streams: Arc<dyn StreamAdapter<R::Event>>,
        snapshots: Arc<dyn SnapshotAdapter<R::State>>,
        options: StepperOptions,
    ) -> Self {
        let state = reducer.initial_state();
        Self {
            reducer,
            view,
            streams,
            snapshots,
            options,
            ready: None,
            state,
            current_index: -1,
        }
    }

    /// Current sequence position (`-1` before the first event)
    pub fn position(&self) -> i64 {
        self.current_index
    }

    pub fn state(&self) -> &R::State {
        &self.state
    }

    /// Whether no further event can be applied
    pub fn is_at_end(&self) -> bool {
        match &self.ready {
            Some(ready) => self.current_index + 1 >= ready.windows.total_events() as i64,
            None => false,
        }
    }

    /// Number of events reachable by this stepper (0 before initialization)
    pub fn total_events(&self) -> usize {
        self.ready.as_ref().map_or(0, |ready| ready.windows.total_events())
    }

    /// Positions currently checkpointed
    pub fn checkpoint_indices(&self) -> Vec<i64> {
        self.ready
            .as_ref()
            .map(|ready| ready.checkpoints.indices())
            .unwrap_or_default()
    }

    async fn ensure_initialized(&mut self, cancel: &CancellationToken) -> EngineResult<()> {
        if self.ready.is_some() {
            return Ok(());
        }
        ensure_not_cancelled(cancel)?;
        self.options.validate()?;

        let mut initial_state = self.reducer.initial_state();
        let mut initial_offset = NO_OFFSET;
        if self.options.use_snapshot {
            let snapshot = self.snapshots.get_snapshot(&self.view).await?;
            if let Some(state) = snapshot.state {
                if snapshot.offset > NO_OFFSET {
                    initial_state = state;
                    initial_offset = snapshot.offset;
                }
            }
        }

        let mut windows = EventWindowManager::new(
            Arc::clone(&self.streams),
            self.view.stream.clone(),
            self.options.window_size,
            self.options.sparse_index_interval,
        );
        windows.initialize(initial_offset + 1, cancel).await?;

        let checkpoints = CheckpointManager::new(
            self.options.checkpoint_interval,
            self.options.max_checkpoints,
            -1,
            initial_state.clone(),
        );

        tracing::debug!(
            view = %self.view,
            total = windows.total_events(),
            initial_offset,
            "stepper initialized"
        );
        self.state = initial_state;
        self.current_index = -1;
        self.ready = Some(Ready {
            windows,
            checkpoints,
            initial_offset,
        });
        Ok(())
    }

    /// Apply events one by one until `target_index` is reached
    async fn advance_to(&mut self, target_index: i64, cancel: &CancellationToken) -> EngineResult<()> {
        let Some(ready) = self.ready.as_mut() else {
            return Ok(());
        };

        while self.current_index < target_index {
            ensure_not_cancelled(cancel)?;
            let next = (self.current_index + 1) as usize;
            if !ready.windows.ensure_event_in_window(next, cancel).await? {
                break;
            }
            let event = ready.windows.get_event_at_index(next).ok_or_else(|| {
                EngineError::Adapter(format!("event at position {} missing from {}", next, self.view))
            })?;

            self.reducer.reduce(&mut self.state, event);
            self.current_index = next as i64;
            ready
                .checkpoints
                .create_checkpoint_if_due(self.current_index, &self.state);
        }
        Ok(())
    }

    /// Result describing the current position
    async fn current_step(
        &mut self,
        cancel: &CancellationToken,
    ) -> EngineResult<StepResult<R::State, R::Event>> {
        let is_at_end = self.is_at_end();
        let Some(ready) = self.ready.as_mut() else {
            return Ok(StepResult {
                state: self.state.clone(),
                event: None,
                offset: NO_OFFSET,
                timestamp: None,
                is_at_end,
            });
        };

        if self.current_index < 0 {
            return Ok(StepResult {
                state: self.state.clone(),
                event: None,
                offset: ready.initial_offset,
                timestamp: None,
                is_at_end,
            });
        }

        let index = self.current_index as usize;
        ready.windows.ensure_event_in_window(index, cancel).await?;
        let event = ready.windows.get_event_at_index(index).cloned().ok_or_else(|| {
            EngineError::Adapter(format!("event at position {} missing from {}", index, self.view))
        })?;

        Ok(StepResult {
            state: self.state.clone(),
            offset: event.offset(),
            timestamp: Some(event.captured_at),
            event: Some(event),
            is_at_end,
        })
    }

    /// Step forward at most `count` events
    ///
    /// Stops early at the end of the stream. `count <= 0` just reads the
    /// current position. Calling again at the end returns the same result.
    pub async fn next(
        &mut self,
        count: i64,
        cancel: &CancellationToken,
    ) -> EngineResult<StepResult<R::State, R::Event>> {
        self.ensure_initialized(cancel).await?;
        if count > 0 {
            let last_index = self.total_events() as i64 - 1;
            let target = self.current_index.saturating_add(count).min(last_index);
            self.advance_to(target, cancel).await?;
        }
        self.current_step(cancel).await
    }

    /// Jump to the last event at or before `target`
    pub async fn goto(
        &mut self,
        target: ReplayTarget,
        cancel: &CancellationToken,
    ) -> EngineResult<StepResult<R::State, R::Event>> {
        self.ensure_initialized(cancel).await?;
        let Some(ready) = self.ready.as_mut() else {
            return self.current_step(cancel).await;
        };

        let index = IndexSearcher::find_index(&ready.windows, &target, cancel).await?;
        if index < 0 {
            self.state = ready.checkpoints.initial_state();
            self.current_index = -1;
        } else if index < self.current_index {
            let (checkpoint_index, state) = ready.checkpoints.restore_from_nearest_checkpoint(index);
            self.state = state;
            self.current_index = checkpoint_index;
            self.advance_to(index, cancel).await?;
        } else if index > self.current_index {
            self.advance_to(index, cancel).await?;
        }
        self.current_step(cancel).await
    }

    /// Back to the initial position, dropping all but the initial checkpoint
    pub async fn reset(
        &mut self,
        cancel: &CancellationToken,
    ) -> EngineResult<StepResult<R::State, R::Event>> {
        self.ensure_initialized(cancel).await?;
        if let Some(ready) = self.ready.as_mut() {
            ready.checkpoints.reset();
            self.state = ready.checkpoints.initial_state();
            self.current_index = -1;
        }
        self.current_step(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        counting_events, ledger, memory_adapters, scenario_events, Ledger, Points, SumReducer,
    };
    use crate::types::{Event, StoredSnapshot};

    fn create_test_stepper(events: Vec<Event<Points>>, options: StepperOptions) -> EventStepper<SumReducer> {
        let (streams, snapshots) = memory_adapters(events);
        EventStepper::new(
            Arc::new(SumReducer),
            ViewAddress::new("sum", ledger()),
            streams,
            snapshots,
            options,
        )
    }

    fn small_options() -> StepperOptions {
        StepperOptions {
            checkpoint_interval: 50,
            use_snapshot: false,
            window_size: 40,
            max_checkpoints: 10,
            sparse_index_interval: 16,
        }
    }

    /// Sum of 1..=n
    fn triangle(n: i64) -> i64 {
        n * (n + 1) / 2
    }

    #[tokio::test]
    async fn test_next_walks_forward_to_end() {
        let mut stepper = create_test_stepper(scenario_events(), StepperOptions::default());
        let cancel = CancellationToken::new();

        let mut offsets = Vec::new();
        for i in 0..5 {
            let step = stepper.next(1, &cancel).await.unwrap();
            offsets.push(step.offset);
            assert_eq!(step.is_at_end, i == 4);
        }
        assert_eq!(offsets, vec![1, 2, 3, 4, 5]);
        assert_eq!(stepper.state().sum, 200);
    }

    #[tokio::test]
    async fn test_next_at_end_is_idempotent() {
        let mut stepper = create_test_stepper(scenario_events(), StepperOptions::default());
        let cancel = CancellationToken::new();

        let last = stepper.next(100, &cancel).await.unwrap();
        assert!(last.is_at_end);
        assert_eq!(last.offset, 5);

        let again = stepper.next(1, &cancel).await.unwrap();
        assert_eq!(again.state, last.state);
        assert_eq!(again.offset, 5);
        assert_eq!(stepper.position(), 4);
    }

    #[tokio::test]
    async fn test_next_zero_reads_current() {
        let mut stepper = create_test_stepper(scenario_events(), StepperOptions::default());
        let cancel = CancellationToken::new();

        let initial = stepper.next(0, &cancel).await.unwrap();
        assert_eq!(initial.offset, -1);
        assert!(initial.event.is_none());
        assert!(!initial.is_at_end);

        stepper.next(2, &cancel).await.unwrap();
        let read = stepper.next(-3, &cancel).await.unwrap();
        assert_eq!(read.offset, 2);
        assert_eq!(read.state.sum, 70);
    }

    #[tokio::test]
    async fn test_goto_backward_uses_checkpoint() {
        let mut stepper = create_test_stepper(counting_events(250), small_options());
        let cancel = CancellationToken::new();

        let far = stepper.goto(ReplayTarget::Offset(200), &cancel).await.unwrap();
        assert_eq!(far.state.sum, triangle(200));
        assert_eq!(stepper.checkpoint_indices(), vec![-1, 49, 99, 149, 199]);

        let back = stepper.goto(ReplayTarget::Offset(75), &cancel).await.unwrap();
        assert_eq!(back.offset, 75);
        assert_eq!(back.state.sum, triangle(75));
    }

    #[tokio::test]
    async fn test_goto_before_first_event() {
        let mut stepper = create_test_stepper(scenario_events(), StepperOptions::default());
        let cancel = CancellationToken::new();

        stepper.next(3, &cancel).await.unwrap();
        let step = stepper.goto(ReplayTarget::Offset(0), &cancel).await.unwrap();
        assert_eq!(step.offset, -1);
        assert_eq!(step.state, Ledger::default());
        assert!(!step.is_at_end);
        assert_eq!(stepper.position(), -1);
    }

    #[tokio::test]
    async fn test_goto_on_empty_stream_is_at_end() {
        let mut stepper = create_test_stepper(Vec::new(), StepperOptions::default());
        let step = stepper
            .goto(ReplayTarget::Offset(3), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(step.offset, -1);
        assert!(step.is_at_end);
    }

    #[tokio::test]
    async fn test_reset_clears_checkpoints() {
        let mut stepper = create_test_stepper(counting_events(120), small_options());
        let cancel = CancellationToken::new();

        stepper.next(120, &cancel).await.unwrap();
        assert_eq!(stepper.checkpoint_indices(), vec![-1, 49, 99]);

        let step = stepper.reset(&cancel).await.unwrap();
        assert_eq!(step.offset, -1);
        assert_eq!(step.state.sum, 0);
        assert_eq!(stepper.checkpoint_indices(), vec![-1]);
    }

    #[tokio::test]
    async fn test_seeded_from_snapshot() {
        let (streams, snapshots) = memory_adapters(scenario_events());
        let view = ViewAddress::new("sum", ledger());
        snapshots.insert(
            view.clone(),
            StoredSnapshot {
                offset: 3,
                stored_at: None,
                state: Some(Ledger { sum: 120 }),
            },
        );
        let options = StepperOptions {
            use_snapshot: true,
            ..StepperOptions::default()
        };
        let mut stepper = EventStepper::new(Arc::new(SumReducer), view, streams, snapshots, options);
        let cancel = CancellationToken::new();

        let initial = stepper.next(0, &cancel).await.unwrap();
        assert_eq!(initial.offset, 3);
        assert_eq!(initial.state.sum, 120);
        assert_eq!(stepper.total_events(), 2);

        let step = stepper.next(1, &cancel).await.unwrap();
        assert_eq!(step.offset, 4);
        assert_eq!(step.state.sum, 240);
    }

    #[tokio::test]
    async fn test_cancelled_before_initialization() {
        let (streams, snapshots) = memory_adapters(scenario_events());
        let mut stepper = EventStepper::new(
            Arc::new(SumReducer),
            ViewAddress::new("sum", ledger()),
            streams.clone(),
            snapshots,
            StepperOptions::default(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = stepper.next(1, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(streams.fetch_count(), 0);

        // a later call with a live token initializes normally
        let step = stepper.next(1, &CancellationToken::new()).await.unwrap();
        assert_eq!(step.offset, 1);
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let options = StepperOptions {
            window_size: 0,
            ..StepperOptions::default()
        };
        let mut stepper = create_test_stepper(scenario_events(), options);
        let err = stepper.next(1, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }
}
