//! Event capture for observability assertions.

use parking_lot::Mutex;
use threadsink_core::{DriverEvent, EventHandler};

/// Event handler that stores every event it receives.
#[derive(Debug, Default)]
pub struct CollectingHandler {
    events: Mutex<Vec<DriverEvent>>,
}

impl CollectingHandler {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured events, in emission order.
    pub fn events(&self) -> Vec<DriverEvent> {
        self.events.lock().clone()
    }

    /// Number of captured `Delivered` events.
    pub fn delivered_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, DriverEvent::Delivered { .. }))
            .count()
    }

    /// Number of captured `Dropped` events.
    pub fn dropped_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, DriverEvent::Dropped { .. }))
            .count()
    }
}

impl EventHandler for CollectingHandler {
    fn handle_event(&self, event: DriverEvent) {
        self.events.lock().push(event);
    }
}
