//! When a view persists its snapshot

use std::fmt;
use std::sync::Arc;

/// Predicate over `(offset_gap, ms_since_last_save)`
pub type SnapshotPredicate = Arc<dyn Fn(i64, i64) -> bool + Send + Sync>;

/// Decides whether `View::store` writes a snapshot
#[derive(Clone, Default)]
pub enum SnapshotPolicy {
    /// Every store call with new events
    #[default]
    Always,
    /// Once at least this many events are unsaved
    EveryEvents(i64),
    /// Once at least this many milliseconds passed since the last save
    EveryMillis(i64),
    Custom(SnapshotPredicate),
}

impl SnapshotPolicy {
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(i64, i64) -> bool + Send + Sync + 'static,
    {
        SnapshotPolicy::Custom(Arc::new(predicate))
    }

    pub fn should_store(&self, offset_gap: i64, ms_since_last_save: i64) -> bool {
        match self {
            SnapshotPolicy::Always => true,
            SnapshotPolicy::EveryEvents(n) => offset_gap >= *n,
            SnapshotPolicy::EveryMillis(ms) => ms_since_last_save >= *ms,
            SnapshotPolicy::Custom(predicate) => predicate(offset_gap, ms_since_last_save),
        }
    }
}

impl fmt::Debug for SnapshotPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotPolicy::Always => write!(f, "Always"),
            SnapshotPolicy::EveryEvents(n) => write!(f, "EveryEvents({})", n),
            SnapshotPolicy::EveryMillis(ms) => write!(f, "EveryMillis({})", ms),
            SnapshotPolicy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
