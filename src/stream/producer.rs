//! Outbox message producers

use crate::types::{Event, EventPayload, OutboxMessage};
use crate::view::StreamView;

/// Derives outbox messages from an appended event and the views' states
pub type MessageProducer<E> =
    Box<dyn Fn(&Event<E>, &ViewStates<'_, E>) -> Vec<OutboxMessage> + Send + Sync>;

/// Read-only access to the current state of a stream's views
pub struct ViewStates<'a, E: EventPayload> {
    views: &'a [Box<dyn StreamView<E>>],
}

impl<'a, E: EventPayload> ViewStates<'a, E> {
    pub(crate) fn new(views: &'a [Box<dyn StreamView<E>>]) -> Self {
        Self { views }
    }

    /// State of the view named `view_name`, if it exists and has type `S`
    pub fn get<S: 'static>(&self, view_name: &str) -> Option<&'a S> {
        let views: &'a [Box<dyn StreamView<E>>] = self.views;
        views
            .iter()
            .find(|v| v.address().view_name == view_name)
            .and_then(|v| v.state_any().downcast_ref::<S>())
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}
