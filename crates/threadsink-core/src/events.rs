//! Delivery event layer for decoupled observability.
//!
//! Drivers emit [`DriverEvent`]s as workers connect, deliver, drop, and
//! shut down. Metrics exporters and audit sinks subscribe through the
//! [`EventHandler`] trait without the delivery machinery knowing about any
//! specific subscriber. Handlers run on the worker thread that produced the
//! event and must not block the delivery path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Disposition;

/// Events emitted by an output driver and its workers.
///
/// `instance` is the driver's stats-instance string
/// (`"<kind>,<discriminator>"`), so one subscriber can observe many drivers
/// and still attribute each event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DriverEvent {
    /// A message was delivered (or accepted asynchronously by the
    /// destination).
    Delivered {
        /// Stats-instance string of the emitting driver.
        instance: String,
        /// Pool slot of the worker that delivered the message.
        worker: usize,
        /// Delivery attempts for this message, including the final one.
        attempts: u32,
        /// When the delivery completed.
        at: DateTime<Utc>,
    },

    /// A message was discarded on the destination's instruction.
    Dropped {
        /// Stats-instance string of the emitting driver.
        instance: String,
        /// Pool slot of the worker that dropped the message.
        worker: usize,
        /// When the message was discarded.
        at: DateTime<Utc>,
    },

    /// A delivery attempt failed and the message will be re-attempted.
    DeliveryFailed {
        /// Stats-instance string of the emitting driver.
        instance: String,
        /// Pool slot of the worker whose attempt failed.
        worker: usize,
        /// Disposition the destination returned.
        disposition: Disposition,
        /// Attempts made for this message so far.
        attempts: u32,
        /// When the attempt failed.
        at: DateTime<Utc>,
    },

    /// A worker established a connection to the destination.
    Connected {
        /// Stats-instance string of the emitting driver.
        instance: String,
        /// Pool slot of the worker that connected.
        worker: usize,
        /// When the connection was established.
        at: DateTime<Utc>,
    },

    /// A worker's connection attempt failed; backoff follows.
    ConnectFailed {
        /// Stats-instance string of the emitting driver.
        instance: String,
        /// Pool slot of the worker whose attempt failed.
        worker: usize,
        /// When the attempt failed.
        at: DateTime<Utc>,
    },

    /// A worker thread finished its thread-local setup and entered its loop.
    WorkerStarted {
        /// Stats-instance string of the emitting driver.
        instance: String,
        /// Pool slot of the started worker.
        worker: usize,
        /// When the worker started.
        at: DateTime<Utc>,
    },

    /// A worker thread left its loop and tore down.
    WorkerStopped {
        /// Stats-instance string of the emitting driver.
        instance: String,
        /// Pool slot of the stopped worker.
        worker: usize,
        /// When the worker stopped.
        at: DateTime<Utc>,
    },
}

impl DriverEvent {
    /// Returns the stats-instance string of the driver that emitted this
    /// event.
    pub fn instance(&self) -> &str {
        match self {
            Self::Delivered { instance, .. }
            | Self::Dropped { instance, .. }
            | Self::DeliveryFailed { instance, .. }
            | Self::Connected { instance, .. }
            | Self::ConnectFailed { instance, .. }
            | Self::WorkerStarted { instance, .. }
            | Self::WorkerStopped { instance, .. } => instance,
        }
    }
}

/// Trait for handling driver events.
///
/// Implementations are called synchronously from worker threads. If event
/// handling fails, the handler should log the failure and return; errors
/// never propagate back into the delivery path.
pub trait EventHandler: Send + Sync + std::fmt::Debug {
    /// Handles a driver event.
    fn handle_event(&self, event: DriverEvent);
}

/// No-op event handler that discards all events.
#[derive(Debug, Default)]
pub struct NoOpEventHandler;

impl NoOpEventHandler {
    /// Creates a new no-op event handler.
    pub fn new() -> Self {
        Self
    }
}

impl EventHandler for NoOpEventHandler {
    fn handle_event(&self, _event: DriverEvent) {}
}

/// Multicast event handler that forwards events to multiple subscribers.
#[derive(Debug, Clone, Default)]
pub struct MulticastEventHandler {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl MulticastEventHandler {
    /// Creates a new multicast handler with no subscribers.
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Adds a subscriber to receive driver events.
    pub fn add_subscriber(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }
}

impl EventHandler for MulticastEventHandler {
    fn handle_event(&self, event: DriverEvent) {
        for handler in &self.handlers {
            handler.handle_event(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug)]
    struct CountingHandler {
        event_count: Arc<AtomicUsize>,
    }

    impl CountingHandler {
        fn new() -> (Self, Arc<AtomicUsize>) {
            let counter = Arc::new(AtomicUsize::new(0));
            let handler = Self { event_count: counter.clone() };
            (handler, counter)
        }
    }

    impl EventHandler for CountingHandler {
        fn handle_event(&self, _event: DriverEvent) {
            self.event_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sample_event() -> DriverEvent {
        DriverEvent::Delivered {
            instance: "file,/var/log/out.log".to_string(),
            worker: 0,
            attempts: 1,
            at: Utc::now(),
        }
    }

    #[test]
    fn no_op_handler_discards_events() {
        NoOpEventHandler::new().handle_event(sample_event());
    }

    #[test]
    fn multicast_handler_forwards_to_all_subscribers() {
        let mut multicast = MulticastEventHandler::new();

        let (handler1, counter1) = CountingHandler::new();
        let (handler2, counter2) = CountingHandler::new();

        multicast.add_subscriber(Arc::new(handler1));
        multicast.add_subscriber(Arc::new(handler2));

        assert_eq!(multicast.subscriber_count(), 2);

        multicast.handle_event(sample_event());

        assert_eq!(counter1.load(Ordering::SeqCst), 1);
        assert_eq!(counter2.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn multicast_handler_handles_empty_subscribers() {
        MulticastEventHandler::new().handle_event(sample_event());
    }

    #[test]
    fn event_instance_accessor_covers_all_variants() {
        let at = Utc::now();
        let instance = "net,localhost:514".to_string();
        let events = [
            DriverEvent::Dropped { instance: instance.clone(), worker: 1, at },
            DriverEvent::ConnectFailed { instance: instance.clone(), worker: 1, at },
            DriverEvent::WorkerStopped { instance: instance.clone(), worker: 1, at },
        ];

        for event in events {
            assert_eq!(event.instance(), "net,localhost:514");
        }
    }
}
