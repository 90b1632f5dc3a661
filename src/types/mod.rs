//! Data types for the event-sourcing engine
//!
//! Immutable values shared by the write path, the adapters and the
//! time-travel subsystem.

mod cursor;
mod diff;
mod event;
mod outbox;
mod snapshot;
mod target;

pub use cursor::{StreamAddress, StreamCursor, ViewAddress, NO_OFFSET};
pub use diff::{DiffSide, StateDiff};
pub use event::{Event, EventMeta, EventPayload};
pub use outbox::{OutboxMessage, StoreResult};
pub use snapshot::{SnapshotData, StoredSnapshot};
pub use target::{ReplayTarget, SparseIndexEntry, StepResult};
