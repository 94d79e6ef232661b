//! A scripted in-memory destination for driver tests.
//!
//! Connect results and insert dispositions are queued ahead of time; when
//! a plan runs out, the destination falls back to succeeding, so tests
//! only script the failures they care about. All workers of a driver share
//! one script, and every hook invocation is counted for assertions.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use threadsink_core::{Disposition, Message};
use threadsink_delivery::{Destination, DestinationWorker, DriverError, Result};

#[derive(Debug, Default)]
struct Script {
    connect_plan: Mutex<VecDeque<bool>>,
    insert_plan: Mutex<VecDeque<Disposition>>,
    thread_init_error: Mutex<Option<String>>,
    insert_delay: Mutex<Option<Duration>>,
    delivered: Mutex<Vec<Message>>,
    connect_attempts: AtomicUsize,
    disconnects: AtomicUsize,
    insert_attempts: AtomicUsize,
}

/// Scripted destination implementing [`Destination`].
///
/// An empty address fails validation, which makes it easy to exercise the
/// missing-required-configuration path of `init`.
#[derive(Debug)]
pub struct ScriptedTarget {
    address: String,
    script: Arc<Script>,
}

impl ScriptedTarget {
    /// Creates a scripted destination pretending to target `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), script: Arc::new(Script::default()) }
    }

    /// Queues outcomes for upcoming `connect` calls. When the plan is
    /// empty, `connect` succeeds.
    pub fn queue_connect_results(&self, results: impl IntoIterator<Item = bool>) {
        self.script.connect_plan.lock().extend(results);
    }

    /// Queues dispositions for upcoming `insert` calls. When the plan is
    /// empty, `insert` returns [`Disposition::Success`].
    pub fn queue_dispositions(&self, dispositions: impl IntoIterator<Item = Disposition>) {
        self.script.insert_plan.lock().extend(dispositions);
    }

    /// Makes every worker's `thread_init` fail with `message`.
    pub fn fail_thread_init(&self, message: impl Into<String>) {
        *self.script.thread_init_error.lock() = Some(message.into());
    }

    /// Makes every `insert` block for `delay` before returning, for
    /// shutdown-timeout scenarios.
    pub fn set_insert_delay(&self, delay: Duration) {
        *self.script.insert_delay.lock() = Some(delay);
    }

    /// Discards all remaining scripted outcomes, restoring the succeeding
    /// defaults. Useful between a `deinit` and the next `init`.
    pub fn clear_plans(&self) {
        self.script.connect_plan.lock().clear();
        self.script.insert_plan.lock().clear();
        *self.script.thread_init_error.lock() = None;
        *self.script.insert_delay.lock() = None;
    }

    /// Messages the destination accepted (`Success` or `Queued`), in
    /// acceptance order.
    pub fn delivered(&self) -> Vec<Message> {
        self.script.delivered.lock().clone()
    }

    /// Accepted message payloads decoded as UTF-8, for compact assertions.
    pub fn delivered_utf8(&self) -> Vec<String> {
        self.delivered()
            .iter()
            .map(|message| String::from_utf8_lossy(message.payload()).into_owned())
            .collect()
    }

    /// Number of `connect` invocations across all workers.
    pub fn connect_attempts(&self) -> usize {
        self.script.connect_attempts.load(Ordering::SeqCst)
    }

    /// Number of `disconnect` invocations across all workers.
    pub fn disconnects(&self) -> usize {
        self.script.disconnects.load(Ordering::SeqCst)
    }

    /// Number of `insert` invocations across all workers.
    pub fn insert_attempts(&self) -> usize {
        self.script.insert_attempts.load(Ordering::SeqCst)
    }
}

impl Destination for ScriptedTarget {
    fn kind(&self) -> &'static str {
        "scripted"
    }

    fn discriminator(&self) -> String {
        self.address.clone()
    }

    fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(DriverError::config("destination address is required"));
        }
        Ok(())
    }

    fn create_worker(&self, _slot: usize) -> Box<dyn DestinationWorker> {
        Box::new(ScriptedWorker { script: self.script.clone() })
    }
}

struct ScriptedWorker {
    script: Arc<Script>,
}

impl DestinationWorker for ScriptedWorker {
    fn thread_init(&mut self) -> Result<()> {
        match self.script.thread_init_error.lock().clone() {
            Some(message) => Err(DriverError::destination(message)),
            None => Ok(()),
        }
    }

    fn connect(&mut self) -> bool {
        self.script.connect_attempts.fetch_add(1, Ordering::SeqCst);
        self.script.connect_plan.lock().pop_front().unwrap_or(true)
    }

    fn disconnect(&mut self) {
        self.script.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn insert(&mut self, message: &Message) -> Disposition {
        self.script.insert_attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *self.script.insert_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let disposition =
            self.script.insert_plan.lock().pop_front().unwrap_or(Disposition::Success);
        if matches!(disposition, Disposition::Success | Disposition::Queued) {
            self.script.delivered.lock().push(message.clone());
        }
        disposition
    }
}
