//! Driver statistics counters.
//!
//! Counters are plain atomics because workers are OS threads on the hot
//! delivery path; a snapshot clones them out for metrics exporters. The
//! metrics registry itself lives outside this crate; it consumes
//! snapshots keyed by the driver's stats-instance string.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Shared counter set owned by one driver.
#[derive(Debug, Default)]
pub(crate) struct DriverStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
    retried: AtomicU64,
    connects: AtomicU64,
    connect_failures: AtomicU64,
    active_workers: AtomicUsize,
}

impl DriverStats {
    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_active_workers(&self, count: usize) {
        self.active_workers.store(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, queued: usize, queue_capacity: usize) -> StatsSnapshot {
        StatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Relaxed),
            queued,
            queue_capacity,
        }
    }
}

/// Point-in-time view of a driver's counters.
///
/// Counters are read individually without a global lock, so a snapshot
/// taken while workers are running is approximate, like the queue length
/// it embeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Messages delivered, including those the destination accepted
    /// asynchronously.
    pub delivered: u64,
    /// Messages discarded on the destination's instruction.
    pub dropped: u64,
    /// Failed delivery attempts that were re-attempted.
    pub retried: u64,
    /// Successful connection attempts.
    pub connects: u64,
    /// Failed connection attempts.
    pub connect_failures: u64,
    /// Workers currently running.
    pub active_workers: usize,
    /// Approximate queue length at snapshot time.
    pub queued: usize,
    /// Configured queue capacity.
    pub queue_capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counts() {
        let stats = DriverStats::default();

        stats.record_delivered();
        stats.record_delivered();
        stats.record_dropped();
        stats.record_retried();
        stats.record_connect();
        stats.record_connect_failure();
        stats.set_active_workers(2);

        let snapshot = stats.snapshot(5, 100);
        assert_eq!(snapshot.delivered, 2);
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(snapshot.retried, 1);
        assert_eq!(snapshot.connects, 1);
        assert_eq!(snapshot.connect_failures, 1);
        assert_eq!(snapshot.active_workers, 2);
        assert_eq!(snapshot.queued, 5);
        assert_eq!(snapshot.queue_capacity, 100);
    }
}
