//! Worker thread loop and disposition policy.
//!
//! Each worker owns the send path for its share of the delivery queue:
//! connect with backoff, dequeue with a bounded wait, deliver, interpret
//! the disposition. Retry is always same-message: the queue never
//! advances past a message until the destination returns `Success`,
//! `Drop`, or `Queued`. That buys ordered, at-least-once delivery per
//! worker at the cost of head-of-line blocking on a persistently failing
//! destination.

use std::{
    sync::{mpsc, Arc},
    time::Duration,
};

use chrono::{DateTime, Utc};
use threadsink_core::{Clock, Disposition, DriverEvent, EventHandler, Message};
use tracing::{debug, error, info, warn};

use crate::{
    backoff::Backoff,
    connection::ConnectionState,
    destination::DestinationWorker,
    error::DriverError,
    queue::DeliveryQueue,
    shutdown::ShutdownToken,
    stats::DriverStats,
};

/// One thread slot of a driver's worker pool.
///
/// Constructed on the driver's thread, then moved onto its own OS thread
/// by the pool. Everything except the queue, stats, and event handler is
/// exclusively owned.
pub(crate) struct Worker {
    slot: usize,
    instance: String,
    target: Box<dyn DestinationWorker>,
    queue: Arc<DeliveryQueue>,
    state: ConnectionState,
    backoff: Backoff,
    dequeue_timeout: Duration,
    shutdown: ShutdownToken,
    stats: Arc<DriverStats>,
    events: Arc<dyn EventHandler>,
    clock: Arc<dyn Clock>,
    /// Attempts made for the message currently in flight, 1-based.
    attempts: u32,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        slot: usize,
        instance: String,
        target: Box<dyn DestinationWorker>,
        queue: Arc<DeliveryQueue>,
        backoff: Backoff,
        dequeue_timeout: Duration,
        shutdown: ShutdownToken,
        stats: Arc<DriverStats>,
        events: Arc<dyn EventHandler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            slot,
            instance,
            target,
            queue,
            state: ConnectionState::Disconnected,
            backoff,
            dequeue_timeout,
            shutdown,
            stats,
            events,
            clock,
            attempts: 0,
        }
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    /// Thread entry point.
    ///
    /// Reports the outcome of `thread_init` on `ready` before entering the
    /// loop, so the driver's `init` can roll the pool back on failure
    /// without any worker having touched the queue.
    pub(crate) fn run(mut self, ready: mpsc::Sender<Result<(), DriverError>>) {
        if let Err(e) = self.target.thread_init() {
            error!(worker = self.slot, instance = %self.instance, error = %e,
                "worker thread-local setup failed");
            let _ = ready.send(Err(DriverError::worker_init(self.slot, e.to_string())));
            return;
        }
        let _ = ready.send(Ok(()));

        info!(worker = self.slot, instance = %self.instance, "delivery worker starting");
        self.events.handle_event(DriverEvent::WorkerStarted {
            instance: self.instance.clone(),
            worker: self.slot,
            at: self.timestamp(),
        });

        let mut pending: Option<Message> = None;

        while !self.shutdown.is_signaled() {
            if !self.state.is_connected() {
                if !self.try_connect() {
                    let delay = self.backoff.next_delay();
                    debug!(worker = self.slot, delay_ms = delay.as_millis() as u64,
                        "connect failed, backing off");
                    if self.shutdown.wait_timeout(delay) {
                        break;
                    }
                    continue;
                }
            }

            let message = match pending.take() {
                Some(message) => message,
                None => match self.queue.dequeue(self.dequeue_timeout) {
                    Some(message) => {
                        self.attempts = 0;
                        message
                    },
                    // Timeout: loop back to re-check shutdown and the
                    // connection without busy-waiting.
                    None => continue,
                },
            };

            pending = self.deliver(message);
        }

        if let Some(message) = pending.take() {
            // Undelivered in-flight message goes back to the front of the
            // queue so a reload redelivers it, in order, exactly once.
            self.queue.requeue_front(message);
        }

        self.disconnect();
        self.target.thread_deinit();

        self.events.handle_event(DriverEvent::WorkerStopped {
            instance: self.instance.clone(),
            worker: self.slot,
            at: self.timestamp(),
        });
        info!(worker = self.slot, instance = %self.instance, "delivery worker stopped");
    }

    /// Attempts one delivery and applies the disposition policy.
    ///
    /// Returns the message when it must be re-attempted; `None` advances
    /// the queue.
    fn deliver(&mut self, message: Message) -> Option<Message> {
        self.attempts += 1;
        let disposition = self.target.insert(&message);

        match disposition {
            Disposition::Success | Disposition::Queued => {
                self.backoff.reset();
                self.stats.record_delivered();
                self.events.handle_event(DriverEvent::Delivered {
                    instance: self.instance.clone(),
                    worker: self.slot,
                    attempts: self.attempts,
                    at: self.timestamp(),
                });
                None
            },
            Disposition::Drop => {
                self.stats.record_dropped();
                warn!(worker = self.slot, instance = %self.instance,
                    message_len = message.len(), "destination dropped message");
                self.events.handle_event(DriverEvent::Dropped {
                    instance: self.instance.clone(),
                    worker: self.slot,
                    at: self.timestamp(),
                });
                None
            },
            Disposition::Retry => {
                self.stats.record_retried();
                self.record_failed_attempt(disposition);
                // Destination asked for a retry on the live connection;
                // back off without tearing it down.
                let delay = self.backoff.next_delay();
                self.shutdown.wait_timeout(delay);
                Some(message)
            },
            Disposition::Error | Disposition::NotConnected => {
                self.stats.record_retried();
                self.record_failed_attempt(disposition);
                self.disconnect();
                Some(message)
            },
        }
    }

    /// Invokes the blocking `connect` hook and applies the state change.
    fn try_connect(&mut self) -> bool {
        self.state = ConnectionState::Connecting;

        if self.target.connect() {
            self.state = ConnectionState::Connected;
            self.backoff.reset();
            self.stats.record_connect();
            debug!(worker = self.slot, instance = %self.instance, "connected to destination");
            self.events.handle_event(DriverEvent::Connected {
                instance: self.instance.clone(),
                worker: self.slot,
                at: self.timestamp(),
            });
            true
        } else {
            self.state = ConnectionState::Disconnected;
            self.stats.record_connect_failure();
            self.events.handle_event(DriverEvent::ConnectFailed {
                instance: self.instance.clone(),
                worker: self.slot,
                at: self.timestamp(),
            });
            false
        }
    }

    /// Tears the connection down. The destination hook is required to be
    /// an idempotent no-op when already disconnected, so this is safe from
    /// any state, including shutdown.
    fn disconnect(&mut self) {
        self.target.disconnect();
        self.state = ConnectionState::Disconnected;
    }

    fn record_failed_attempt(&self, disposition: Disposition) {
        debug!(worker = self.slot, instance = %self.instance,
            disposition = %disposition, attempts = self.attempts,
            "delivery attempt failed, will re-attempt same message");
        self.events.handle_event(DriverEvent::DeliveryFailed {
            instance: self.instance.clone(),
            worker: self.slot,
            disposition,
            attempts: self.attempts,
            at: self.timestamp(),
        });
    }

    fn timestamp(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.clock.now_system())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use threadsink_core::{NoOpEventHandler, RealClock};

    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::error::Result;

    /// Destination stub with scripted dispositions and call counters.
    struct StubTarget {
        dispositions: Arc<Mutex<VecDeque<Disposition>>>,
        disconnects: Arc<AtomicUsize>,
        connect_result: bool,
    }

    impl DestinationWorker for StubTarget {
        fn thread_init(&mut self) -> Result<()> {
            Ok(())
        }

        fn connect(&mut self) -> bool {
            self.connect_result
        }

        fn disconnect(&mut self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }

        fn insert(&mut self, _message: &Message) -> Disposition {
            self.dispositions.lock().unwrap().pop_front().unwrap_or(Disposition::Success)
        }
    }

    struct Fixture {
        worker: Worker,
        disconnects: Arc<AtomicUsize>,
        stats: Arc<DriverStats>,
    }

    fn fixture(dispositions: Vec<Disposition>) -> Fixture {
        let disconnects = Arc::new(AtomicUsize::new(0));
        let target = StubTarget {
            dispositions: Arc::new(Mutex::new(dispositions.into())),
            disconnects: disconnects.clone(),
            connect_result: true,
        };
        let stats = Arc::new(DriverStats::default());
        let policy = BackoffPolicy {
            floor: Duration::from_millis(1),
            ceiling: Duration::from_millis(4),
            ..Default::default()
        };
        let worker = Worker::new(
            0,
            "stub,test".to_string(),
            Box::new(target),
            Arc::new(DeliveryQueue::new(8)),
            Backoff::new(policy),
            Duration::from_millis(10),
            ShutdownToken::new(),
            stats.clone(),
            Arc::new(NoOpEventHandler),
            Arc::new(RealClock),
        );
        Fixture { worker, disconnects, stats }
    }

    #[test]
    fn success_advances_and_resets_backoff() {
        let mut f = fixture(vec![Disposition::Success]);
        f.worker.backoff.next_delay();
        f.worker.backoff.next_delay();

        let pending = f.worker.deliver(Message::from("a"));

        assert!(pending.is_none());
        assert_eq!(f.worker.backoff.current_delay(), Duration::from_millis(1));
        assert_eq!(f.stats.snapshot(0, 8).delivered, 1);
    }

    #[test]
    fn queued_advances_like_success() {
        let mut f = fixture(vec![Disposition::Queued]);

        let pending = f.worker.deliver(Message::from("a"));

        assert!(pending.is_none());
        assert_eq!(f.stats.snapshot(0, 8).delivered, 1);
    }

    #[test]
    fn drop_discards_without_disconnect() {
        let mut f = fixture(vec![Disposition::Drop]);

        let pending = f.worker.deliver(Message::from("a"));

        assert!(pending.is_none());
        assert_eq!(f.disconnects.load(Ordering::SeqCst), 0);
        let snapshot = f.stats.snapshot(0, 8);
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(snapshot.delivered, 0);
    }

    #[test]
    fn error_disconnects_and_keeps_message() {
        let mut f = fixture(vec![Disposition::Error]);
        f.worker.state = ConnectionState::Connected;

        let pending = f.worker.deliver(Message::from("a"));

        assert_eq!(pending.unwrap().payload(), b"a");
        assert_eq!(f.disconnects.load(Ordering::SeqCst), 1);
        assert!(!f.worker.state.is_connected());
        assert_eq!(f.stats.snapshot(0, 8).retried, 1);
    }

    #[test]
    fn not_connected_behaves_like_error() {
        let mut f = fixture(vec![Disposition::NotConnected]);
        f.worker.state = ConnectionState::Connected;

        let pending = f.worker.deliver(Message::from("a"));

        assert!(pending.is_some());
        assert_eq!(f.disconnects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_keeps_message_and_connection() {
        let mut f = fixture(vec![Disposition::Retry]);
        f.worker.state = ConnectionState::Connected;

        let pending = f.worker.deliver(Message::from("a"));

        assert_eq!(pending.unwrap().payload(), b"a");
        assert_eq!(f.disconnects.load(Ordering::SeqCst), 0);
        assert!(f.worker.state.is_connected());
    }

    #[test]
    fn retry_backoff_grows_until_success() {
        let mut f = fixture(vec![Disposition::Retry, Disposition::Retry, Disposition::Success]);
        f.worker.state = ConnectionState::Connected;

        let message = Message::from("a");
        let message = f.worker.deliver(message).expect("first attempt retries");
        assert_eq!(f.worker.backoff.current_delay(), Duration::from_millis(2));

        let message = f.worker.deliver(message).expect("second attempt retries");
        assert_eq!(f.worker.backoff.current_delay(), Duration::from_millis(4));

        assert!(f.worker.deliver(message).is_none());
        assert_eq!(f.worker.backoff.current_delay(), Duration::from_millis(1));
        assert_eq!(f.worker.attempts, 3);
    }

    #[test]
    fn successful_connect_resets_backoff_and_records() {
        let mut f = fixture(vec![]);
        f.worker.backoff.next_delay();
        f.worker.backoff.next_delay();

        assert!(f.worker.try_connect());
        assert!(f.worker.state.is_connected());
        assert_eq!(f.worker.backoff.current_delay(), Duration::from_millis(1));
        assert_eq!(f.stats.snapshot(0, 8).connects, 1);
    }

    #[test]
    fn failed_connect_stays_disconnected() {
        let mut f = fixture(vec![]);
        f.worker.target = Box::new(StubTarget {
            dispositions: Arc::new(Mutex::new(VecDeque::new())),
            disconnects: f.disconnects.clone(),
            connect_result: false,
        });

        assert!(!f.worker.try_connect());
        assert!(!f.worker.state.is_connected());
        assert_eq!(f.stats.snapshot(0, 8).connect_failures, 1);
    }
}
