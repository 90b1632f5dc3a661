//! CheckpointManager - bounded in-memory state checkpoints
//!
//! A stepper records a checkpoint every `interval` applied steps. Moving
//! backward restores the nearest checkpoint at or before the target and
//! replays forward from there instead of from the beginning.
//!
//! The initial checkpoint (position `initial_index`) is protected: when the
//! set is full the oldest *other* checkpoint is evicted. States are cloned
//! on the way in and on the way out, so the manager never shares a value
//! with the live stepper state.

pub struct CheckpointManager<S: Clone> {
    interval: usize,
    max_checkpoints: usize,
    initial_index: i64,
    initial_state: S,
    /// Sorted by position
    checkpoints: Vec<(i64, S)>,
}

impl<S: Clone> CheckpointManager<S> {
    pub fn new(interval: usize, max_checkpoints: usize, initial_index: i64, initial_state: S) -> Self {
        let checkpoints = vec![(initial_index, initial_state.clone())];
        Self {
            interval: interval.max(1),
            max_checkpoints: max_checkpoints.max(1),
            initial_index,
            initial_state,
            checkpoints,
        }
    }

    /// Checkpoint `state` at `index` if `index` is on the interval grid
    ///
    /// Returns whether a checkpoint was created.
    pub fn create_checkpoint_if_due(&mut self, index: i64, state: &S) -> bool {
        if index < 0 || (index + 1) % self.interval as i64 != 0 {
            return false;
        }
        if self.position_of(index).is_ok() {
            return false;
        }

        if self.checkpoints.len() >= self.max_checkpoints {
            self.evict();
        }
        let pos = self.checkpoints.partition_point(|(i, _)| *i < index);
        self.checkpoints.insert(pos, (index, state.clone()));
        true
    }

    fn position_of(&self, index: i64) -> Result<usize, usize> {
        self.checkpoints.binary_search_by_key(&index, |(i, _)| *i)
    }

    fn evict(&mut self) {
        if self.checkpoints.is_empty() {
            return;
        }
        let protected = self.checkpoints[0].0 == self.initial_index && self.checkpoints.len() > 1;
        let (evicted, _) = self.checkpoints.remove(if protected { 1 } else { 0 });
        tracing::trace!(index = evicted, "checkpoint evicted");
    }

    /// Nearest checkpoint at or before `target_index`
    ///
    /// Falls back to the initial state when none qualifies.
    pub fn restore_from_nearest_checkpoint(&self, target_index: i64) -> (i64, S) {
        let pos = self.checkpoints.partition_point(|(i, _)| *i <= target_index);
        match pos.checked_sub(1).map(|p| &self.checkpoints[p]) {
            Some((index, state)) => (*index, state.clone()),
            None => (self.initial_index, self.initial_state.clone()),
        }
    }

    /// Drop everything except the initial checkpoint
    pub fn reset(&mut self) {
        self.checkpoints.clear();
        self.checkpoints.push((self.initial_index, self.initial_state.clone()));
    }

    pub fn initial_index(&self) -> i64 {
        self.initial_index
    }

    /// Copy of the protected initial state
    pub fn initial_state(&self) -> S {
        self.initial_state.clone()
    }

    /// Positions currently checkpointed, ascending
    pub fn indices(&self) -> Vec<i64> {
        self.checkpoints.iter().map(|(i, _)| *i).collect()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}
