//! Eventline
//!
//! An embeddable event-sourcing engine with time travel.
//!
//! # Features
//!
//! - **Streams**: append-only, per-entity event logs with optimistic
//!   concurrency on `(stream, offset)`
//! - **Views**: reducer-driven projections persisted as snapshots
//! - **Outbox**: integration messages stored atomically with their events
//! - **Time Travel**: replay to an offset or instant, step forward and
//!   backward with checkpoints, diff two points in history
//! - **Adapters**: in-memory and JSONL file storage behind async traits
//!
//! # Modules
//!
//! - `types`: Addresses, cursors, events, snapshots, replay targets
//! - `adapter`: Storage traits and the memory/JSONL implementations
//! - `view`: Reducers, views and snapshot policies
//! - `stream`: The write side (append, store, outbox)
//! - `time_travel`: Replay engine, stepper, sparse-index window, diff
//! - `config`: Engine tuning knobs
//! - `error`: `EngineError` and cancellation checks
//! - `utils`: Atomic file writes and time helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use eventline::{
//!     Event, EventPayload, MemorySnapshotAdapter, MemoryStreamAdapter, Reducer, ReplayOptions,
//!     Stream, StreamAddress, TimeTraveler, View,
//! };
//!
//! #[derive(Clone)]
//! struct Deposited(i64);
//!
//! impl EventPayload for Deposited {
//!     fn event_type(&self) -> &str {
//!         "Deposited"
//!     }
//! }
//!
//! struct Balance;
//!
//! impl Reducer for Balance {
//!     type State = i64;
//!     type Event = Deposited;
//!
//!     fn view_name(&self) -> &str {
//!         "balance"
//!     }
//!
//!     fn initial_state(&self) -> i64 {
//!         0
//!     }
//!
//!     fn reduce(&self, state: &mut i64, event: &Event<Deposited>) {
//!         *state += event.payload.0;
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> eventline::EngineResult<()> {
//!     let address = StreamAddress::new("account", "42");
//!     let streams = Arc::new(MemoryStreamAdapter::<Deposited>::new());
//!     let snapshots = Arc::new(MemorySnapshotAdapter::<i64>::new());
//!
//!     let view = View::new(Arc::new(Balance), address.clone(), snapshots.clone());
//!     let mut stream = Stream::new(address.clone(), streams.clone()).with_view(view);
//!     stream.append_event(Deposited(10), None);
//!     stream.append_event(Deposited(5), None);
//!     stream.store().await?;
//!
//!     let traveler = TimeTraveler::new(Arc::new(Balance), address, streams, snapshots);
//!     let balance = traveler.replay_to_offset(1, ReplayOptions::default()).await?;
//!     assert_eq!(balance, 10);
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod stream;
pub mod time_travel;
pub mod types;
pub mod utils;
pub mod view;

#[cfg(test)]
mod test_support;

// Re-export commonly used items at crate root
pub use adapter::{
    EventStream, JsonlConfig, JsonlSnapshotAdapter, JsonlStreamAdapter, MemorySnapshotAdapter,
    MemoryStreamAdapter, SnapshotAdapter, StreamAdapter,
};
pub use config::EngineConfig;
pub use error::{ensure_not_cancelled, EngineError, EngineResult};
pub use stream::{MessageProducer, Stream, ViewStates};
pub use time_travel::{
    DiffOptions, EventStepper, ReplayEngine, ReplayOptions, StepperOptions, TimeTraveler,
};
pub use types::{
    Event, EventMeta, EventPayload, OutboxMessage, ReplayTarget, StateDiff, StepResult,
    StoreResult, StoredSnapshot, StreamAddress, StreamCursor, ViewAddress, NO_OFFSET,
};
pub use view::{Reducer, SnapshotPolicy, StreamView, View};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
