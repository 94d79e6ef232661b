//! Driver lifecycle: the single object the pipeline addresses.
//!
//! A driver owns its configuration, its delivery queue, and its worker
//! pool. The pipeline creates one driver per configured destination at
//! configuration-load time, then calls `init`/`deinit` around every
//! reload on the same instance; the queue's unconsumed contents survive
//! those cycles and are discarded only by final teardown.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use threadsink_core::{Clock, EventHandler, Message, NoOpEventHandler, RealClock};
use tracing::{debug, info, warn};

use crate::{
    backoff::{Backoff, BackoffPolicy},
    destination::Destination,
    error::{DriverError, Result},
    naming,
    pool::WorkerPool,
    queue::{DeliveryQueue, EnqueueError},
    shutdown::ShutdownToken,
    stats::{DriverStats, StatsSnapshot},
    worker::Worker,
};

/// Configuration for one output driver.
///
/// These are the core's own options; destination-specific options live on
/// the destination implementation and are opaque here. The configuration
/// is immutable while the driver is running; setters only work between
/// `deinit` and the next `init`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Optional user-supplied instance name, used to keep persisted state
    /// apart when several instances of one kind share a discriminator.
    pub name: Option<String>,

    /// Number of worker threads in the pool. A pool of one is the
    /// single-worker compatibility mode, not a separate code path.
    pub worker_count: usize,

    /// Maximum number of messages the delivery queue holds.
    pub queue_capacity: usize,

    /// Bound on each worker's dequeue wait, which is also the worst-case
    /// latency for a blocked worker to notice shutdown.
    pub dequeue_timeout: Duration,

    /// Backoff applied between failed connection attempts and explicit
    /// retry dispositions.
    pub backoff: BackoffPolicy,

    /// How long `init` waits for every worker to finish its thread-local
    /// setup.
    pub startup_timeout: Duration,

    /// Grace period `deinit` waits for worker threads to stop. Exceeding
    /// it is fatal to the process.
    pub shutdown_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: None,
            worker_count: crate::DEFAULT_WORKER_COUNT,
            queue_capacity: crate::DEFAULT_QUEUE_CAPACITY,
            dequeue_timeout: Duration::from_millis(500),
            backoff: BackoffPolicy::default(),
            startup_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl DriverConfig {
    fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(DriverError::config("worker count must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(DriverError::config("queue capacity must be at least 1"));
        }
        if self.dequeue_timeout.is_zero() {
            return Err(DriverError::config("dequeue timeout must be greater than zero"));
        }
        self.backoff.validate()
    }
}

/// A threaded output driver for one logical destination.
pub struct Driver {
    config: DriverConfig,
    destination: Arc<dyn Destination>,
    queue: Option<Arc<DeliveryQueue>>,
    pool: Option<WorkerPool>,
    stats: Arc<DriverStats>,
    events: Arc<dyn EventHandler>,
    clock: Arc<dyn Clock>,
}

impl Driver {
    /// Creates a driver with the real clock and no event subscribers.
    ///
    /// Nothing starts until [`Driver::init`].
    pub fn new(destination: Arc<dyn Destination>, config: DriverConfig) -> Self {
        Self::with_event_handler(destination, config, Arc::new(RealClock), Arc::new(NoOpEventHandler))
    }

    /// Creates a driver with injected clock and event handler.
    ///
    /// Dependency injection of both keeps time-dependent behavior and
    /// observability testable without a live destination.
    pub fn with_event_handler(
        destination: Arc<dyn Destination>,
        config: DriverConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            config,
            destination,
            queue: None,
            pool: None,
            stats: Arc::new(DriverStats::default()),
            events,
            clock,
        }
    }

    /// Returns true while the worker pool is running.
    pub fn is_running(&self) -> bool {
        self.pool.is_some()
    }

    /// Sets the user-supplied instance name. Valid only while stopped.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the driver is running.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.ensure_stopped()?;
        self.config.name = Some(name.into());
        Ok(())
    }

    /// Sets the worker pool size. Valid only while stopped.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the driver is running.
    pub fn set_worker_count(&mut self, worker_count: usize) -> Result<()> {
        self.ensure_stopped()?;
        self.config.worker_count = worker_count;
        Ok(())
    }

    /// Sets the queue capacity used when the queue is next constructed.
    /// Valid only while stopped; an existing queue preserved across a
    /// reload keeps its original capacity.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the driver is running.
    pub fn set_queue_capacity(&mut self, queue_capacity: usize) -> Result<()> {
        self.ensure_stopped()?;
        self.config.queue_capacity = queue_capacity;
        Ok(())
    }

    /// Sets the backoff policy. Valid only while stopped.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the driver is running.
    pub fn set_backoff(&mut self, backoff: BackoffPolicy) -> Result<()> {
        self.ensure_stopped()?;
        self.config.backoff = backoff;
        Ok(())
    }

    /// Validates configuration and starts the worker pool.
    ///
    /// Repeatable across reloads on the same instance: calling `init` on a
    /// running driver is a success no-op, and `init` after `deinit` starts
    /// a fresh pool against the preserved queue. On failure nothing is
    /// left running: configuration errors are detected before any thread
    /// starts, and a worker whose thread-local setup fails rolls the whole
    /// pool back.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid core or destination
    /// configuration, or the worker's setup failure.
    pub fn init(&mut self) -> Result<()> {
        if self.pool.is_some() {
            debug!(instance = %self.stats_instance(), "driver already initialized");
            return Ok(());
        }

        self.config.validate()?;
        self.destination.validate()?;

        let queue = self
            .queue
            .get_or_insert_with(|| Arc::new(DeliveryQueue::new(self.config.queue_capacity)))
            .clone();

        let shutdown = ShutdownToken::new();
        let instance = self.stats_instance();
        let workers = (0..self.config.worker_count)
            .map(|slot| {
                Worker::new(
                    slot,
                    instance.clone(),
                    self.destination.create_worker(slot),
                    queue.clone(),
                    Backoff::new(self.config.backoff.clone()),
                    self.config.dequeue_timeout,
                    shutdown.clone(),
                    self.stats.clone(),
                    self.events.clone(),
                    self.clock.clone(),
                )
            })
            .collect();

        let pool = WorkerPool::spawn(workers, shutdown, self.config.startup_timeout)?;
        self.stats.set_active_workers(pool.worker_count());
        self.pool = Some(pool);

        info!(
            instance = %instance,
            workers = self.config.worker_count,
            queued = queue.len(),
            "output driver started"
        );
        Ok(())
    }

    /// Stops the worker pool, preserving the queue's unconsumed contents
    /// for a subsequent `init` (reload).
    ///
    /// Idempotent: `deinit` on a stopped driver succeeds immediately.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownTimeout` or `WorkerPanic`, both fatal, when the
    /// pool cannot be stopped cleanly within the grace period.
    pub fn deinit(&mut self) -> Result<()> {
        let Some(pool) = self.pool.take() else {
            return Ok(());
        };

        let result = pool.shutdown_graceful(self.config.shutdown_timeout);
        self.stats.set_active_workers(0);

        match &result {
            Ok(()) => info!(instance = %self.stats_instance(), "output driver stopped"),
            Err(error) => warn!(
                instance = %self.stats_instance(),
                error = %error,
                "output driver shutdown failed"
            ),
        }
        result
    }

    /// Hands a message to the delivery queue, forwarding the queue's
    /// backpressure signal unchanged.
    ///
    /// Safe to call from the pipeline's thread concurrently with the
    /// workers.
    ///
    /// # Errors
    ///
    /// Returns the rejected message inside the error when the queue is
    /// full or not yet constructed.
    pub fn enqueue(&self, message: Message) -> std::result::Result<(), EnqueueError> {
        match &self.queue {
            Some(queue) => queue.enqueue(message),
            None => Err(EnqueueError::NotStarted(message)),
        }
    }

    /// Point-in-time statistics for this driver.
    pub fn stats(&self) -> StatsSnapshot {
        let (queued, capacity) = match &self.queue {
            Some(queue) => (queue.len(), queue.capacity()),
            None => (0, self.config.queue_capacity),
        };
        self.stats.snapshot(queued, capacity)
    }

    /// The stats-instance string grouping metrics for this driver:
    /// `"<kind>,<discriminator>"`.
    pub fn stats_instance(&self) -> String {
        naming::stats_instance(self.destination.kind(), &self.destination.discriminator())
    }

    /// The persisted-state key for this driver:
    /// `"<kind>.<user-name-or-discriminator>"`, stable across reloads.
    pub fn persist_name(&self) -> String {
        naming::persist_name(
            self.destination.kind(),
            self.config.name.as_deref(),
            &self.destination.discriminator(),
        )
    }

    /// Final teardown: stops the pool and discards any messages still
    /// queued. Only this path loses messages; reloads never do.
    ///
    /// # Errors
    ///
    /// Propagates the fatal shutdown errors of [`Driver::deinit`].
    pub fn free(mut self) -> Result<()> {
        self.deinit()?;
        if let Some(queue) = self.queue.take() {
            let discarded = queue.clear();
            if discarded > 0 {
                warn!(
                    instance = %self.stats_instance(),
                    discarded,
                    "discarding undelivered messages at final teardown"
                );
            }
        }
        Ok(())
    }

    fn ensure_stopped(&self) -> Result<()> {
        if self.pool.is_some() {
            return Err(DriverError::config(
                "configuration is immutable while the driver is running",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DriverConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_worker_count_rejected() {
        let config = DriverConfig { worker_count: 0, ..Default::default() };
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("worker count"));
    }

    #[test]
    fn zero_queue_capacity_rejected() {
        let config = DriverConfig { queue_capacity: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_backoff_rejected_through_config() {
        let config = DriverConfig {
            backoff: BackoffPolicy { floor: Duration::ZERO, ..Default::default() },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = DriverConfig {
            name: Some("audit".to_string()),
            worker_count: 4,
            ..Default::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        let restored: DriverConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }
}
