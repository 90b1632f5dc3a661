//! IndexSearcher - resolve a replay target to a sequence position
//!
//! Binary-searches the sparse index for the bracket that contains the
//! target, then scans only that bracket event by event: in memory when the
//! window already holds it, otherwise with a single read from storage.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::{ensure_not_cancelled, EngineResult};
use crate::types::{EventPayload, ReplayTarget, SparseIndexEntry};

use super::window::EventWindowManager;

pub struct IndexSearcher;

impl IndexSearcher {
    /// Greatest sequence position whose event is at or before `target`
    ///
    /// Returns `-1` when no event qualifies (the target precedes the first
    /// event, or the stream is empty).
    pub async fn find_index<E: EventPayload>(
        windows: &EventWindowManager<E>,
        target: &ReplayTarget,
        cancel: &CancellationToken,
    ) -> EngineResult<i64> {
        let Some((lo, hi)) = Self::bracket(windows.sparse_index(), target, windows.total_events()) else {
            return Ok(-1);
        };

        let window = windows.window_range();
        if window.start <= lo && hi <= window.end {
            let mut found = lo;
            for index in lo + 1..hi {
                match windows.get_event_at_index(index) {
                    Some(event) if !target.is_exceeded_by(event) => found = index,
                    _ => break,
                }
            }
            return Ok(found as i64);
        }

        // One pass over storage from the bracket's index entry
        let entries = windows.sparse_index();
        let Ok(pos) = entries.binary_search_by_key(&lo, |entry| entry.seq) else {
            return Ok(lo as i64);
        };
        let start_offset = entries[pos].offset;

        ensure_not_cancelled(cancel)?;
        let mut events = windows.events_from(start_offset);
        let mut found = lo;
        let mut seq = lo;
        while seq < hi {
            let Some(event) = events.next().await else {
                break;
            };
            let event = event?;
            ensure_not_cancelled(cancel)?;
            if target.is_exceeded_by(&event) {
                break;
            }
            found = seq;
            seq += 1;
        }
        Ok(found as i64)
    }

    /// Sequence range `[lo, hi)` that must contain the answer
    ///
    /// `lo` is the seq of the last index entry at or before the target and
    /// is itself a match; `hi` is the next entry's seq (or the stream length).
    pub fn bracket(
        entries: &[SparseIndexEntry],
        target: &ReplayTarget,
        total_events: usize,
    ) -> Option<(usize, usize)> {
        let pos = entries.partition_point(|entry| match target {
            ReplayTarget::Offset(offset) => entry.offset <= *offset,
            ReplayTarget::Timestamp(ts) => entry.timestamp <= *ts,
        });
        let lo = entries.get(pos.checked_sub(1)?)?.seq;
        let hi = entries.get(pos).map(|entry| entry.seq).unwrap_or(total_events);
        Some((lo, hi))
    }
}
