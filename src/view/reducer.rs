//! Reducers: the pure fold from events to view state

use crate::types::{Event, EventPayload};

/// Folds a stream's events into one view's state
///
/// Dispatch happens by matching on the payload enum. Payload variants that
/// stand for event types unknown to this build (a `#[serde(other)]` catch-all)
/// should leave the state untouched.
///
/// `reduce` must be deterministic: the same events in the same order always
/// produce the same state. States are copied with their `Clone` impl whenever
/// they cross an ownership boundary (checkpoints, step results, snapshots), so
/// large states should make `Clone` cheap (e.g. `Arc`-shared internals).
pub trait Reducer: Send + Sync + 'static {
    type State: Clone + Send + Sync + 'static;
    type Event: EventPayload;

    /// Name of the view this reducer maintains
    fn view_name(&self) -> &str;

    /// State before any event is applied
    fn initial_state(&self) -> Self::State;

    /// Apply one event to `state`
    fn reduce(&self, state: &mut Self::State, event: &Event<Self::Event>);
}

/// Fold `events` onto `state` in order
pub fn fold<'a, R, I>(reducer: &R, state: &mut R::State, events: I)
where
    R: Reducer,
    I: IntoIterator<Item = &'a Event<R::Event>>,
{
    for event in events {
        reducer.reduce(state, event);
    }
}
