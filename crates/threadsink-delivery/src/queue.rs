//! Bounded delivery queue shared between a driver and its workers.
//!
//! The queue is the only state shared across the producer/worker boundary.
//! Producers enqueue on the pipeline's thread and receive a backpressure
//! signal (with the message handed back) when the queue is at capacity;
//! workers dequeue with a bounded wait so they can periodically re-check
//! shutdown and connection state without busy-waiting.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use threadsink_core::Message;

/// Backpressure signal returned by [`DeliveryQueue::enqueue`].
///
/// The rejected message is handed back so the producer can block, spill,
/// or reject upstream; the queue never silently drops.
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// The queue is at capacity.
    #[error("delivery queue is full")]
    Full(Message),

    /// The driver has not been initialized, so no queue exists yet.
    #[error("driver is not running")]
    NotStarted(Message),
}

impl EnqueueError {
    /// Recovers the rejected message.
    pub fn into_message(self) -> Message {
        match self {
            Self::Full(message) | Self::NotStarted(message) => message,
        }
    }
}

/// Bounded FIFO handoff of messages from the producer to the worker pool.
///
/// Multiple workers may dequeue concurrently; each enqueued message is
/// handed to exactly one worker. `len` is an approximate, non-blocking read
/// intended for metrics.
#[derive(Debug)]
pub struct DeliveryQueue {
    items: Mutex<VecDeque<Message>>,
    not_empty: Condvar,
    capacity: usize,
    len: AtomicUsize,
}

impl DeliveryQueue {
    /// Creates a queue bounded at `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            not_empty: Condvar::new(),
            capacity,
            len: AtomicUsize::new(0),
        }
    }

    /// Appends a message, failing with [`EnqueueError::Full`] at capacity.
    ///
    /// Never blocks the producer.
    pub fn enqueue(&self, message: Message) -> std::result::Result<(), EnqueueError> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(EnqueueError::Full(message));
        }
        items.push_back(message);
        self.len.store(items.len(), Ordering::Relaxed);
        drop(items);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest message, waiting up to `timeout` for one to
    /// arrive. Returns `None` on expiry so the caller can re-check its
    /// shutdown and reconnect signals.
    pub fn dequeue(&self, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        while items.is_empty() {
            if self.not_empty.wait_until(&mut items, deadline).timed_out() {
                break;
            }
        }
        let message = items.pop_front();
        self.len.store(items.len(), Ordering::Relaxed);
        message
    }

    /// Returns a dequeued-but-undelivered message to the front of the
    /// queue, preserving order for the next worker (or the next `init` on
    /// reload).
    ///
    /// Exempt from the capacity check: the message's slot was never
    /// logically released while it was in flight.
    pub fn requeue_front(&self, message: Message) {
        let mut items = self.items.lock();
        items.push_front(message);
        self.len.store(items.len(), Ordering::Relaxed);
        drop(items);
        self.not_empty.notify_one();
    }

    /// Approximate number of queued messages. Eventually consistent under
    /// concurrent mutation; intended for metrics only.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns true when the queue is (approximately) empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of messages the queue holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discards all queued messages, returning how many were dropped.
    ///
    /// Used only at final teardown; reloads preserve queue contents.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let discarded = items.len();
        items.clear();
        self.len.store(0, Ordering::Relaxed);
        discarded
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    const SHORT_WAIT: Duration = Duration::from_millis(20);

    #[test]
    fn messages_dequeue_in_enqueue_order() {
        let queue = DeliveryQueue::new(8);

        queue.enqueue(Message::from("a")).unwrap();
        queue.enqueue(Message::from("b")).unwrap();
        queue.enqueue(Message::from("c")).unwrap();

        assert_eq!(queue.dequeue(SHORT_WAIT).unwrap().payload(), b"a");
        assert_eq!(queue.dequeue(SHORT_WAIT).unwrap().payload(), b"b");
        assert_eq!(queue.dequeue(SHORT_WAIT).unwrap().payload(), b"c");
        assert!(queue.is_empty());
    }

    #[test]
    fn enqueue_at_capacity_returns_message() {
        let queue = DeliveryQueue::new(2);

        queue.enqueue(Message::from("a")).unwrap();
        queue.enqueue(Message::from("b")).unwrap();

        let rejected = queue.enqueue(Message::from("c")).unwrap_err();
        assert!(matches!(rejected, EnqueueError::Full(_)));
        assert_eq!(rejected.into_message().payload(), b"c");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn dequeue_times_out_on_empty_queue() {
        let queue = DeliveryQueue::new(4);

        let start = Instant::now();
        assert!(queue.dequeue(SHORT_WAIT).is_none());
        assert!(start.elapsed() >= SHORT_WAIT);
    }

    #[test]
    fn dequeue_wakes_on_enqueue() {
        let queue = Arc::new(DeliveryQueue::new(4));
        let producer_queue = queue.clone();

        let consumer = thread::spawn(move || queue.dequeue(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(10));
        producer_queue.enqueue(Message::from("wake")).unwrap();

        let message = consumer.join().unwrap().expect("consumer should receive the message");
        assert_eq!(message.payload(), b"wake");
    }

    #[test]
    fn requeue_front_precedes_existing_messages() {
        let queue = DeliveryQueue::new(4);

        queue.enqueue(Message::from("b")).unwrap();
        queue.requeue_front(Message::from("a"));

        assert_eq!(queue.dequeue(SHORT_WAIT).unwrap().payload(), b"a");
        assert_eq!(queue.dequeue(SHORT_WAIT).unwrap().payload(), b"b");
    }

    #[test]
    fn concurrent_consumers_receive_each_message_exactly_once() {
        const MESSAGES: usize = 200;
        let queue = Arc::new(DeliveryQueue::new(MESSAGES));

        for i in 0..MESSAGES {
            queue.enqueue(Message::new(format!("{i:04}").into_bytes())).unwrap();
        }

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(thread::spawn(move || {
                let mut received = Vec::new();
                while let Some(message) = queue.dequeue(Duration::from_millis(50)) {
                    received.push(String::from_utf8(message.payload().to_vec()).unwrap());
                }
                received
            }));
        }

        let mut all: Vec<String> =
            consumers.into_iter().flat_map(|handle| handle.join().unwrap()).collect();
        all.sort();

        let expected: Vec<String> = (0..MESSAGES).map(|i| format!("{i:04}")).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn clear_reports_discarded_count() {
        let queue = DeliveryQueue::new(4);
        queue.enqueue(Message::from("a")).unwrap();
        queue.enqueue(Message::from("b")).unwrap();

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(queue.dequeue(Duration::from_millis(1)).is_none());
    }
}
