//! Worker pool lifecycle management.
//!
//! Spawns one OS thread per worker, collects the startup handshake so a
//! failed `thread_init` rolls the whole pool back before `init` returns,
//! and joins threads against a grace deadline at shutdown. A worker that
//! does not stop within the grace period is a fatal condition surfaced to
//! the caller, never silently ignored.

use std::{
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use tracing::{error, info, warn};

use crate::{
    error::{DriverError, Result},
    shutdown::ShutdownToken,
    worker::Worker,
};

/// Poll interval for the bounded thread-join loop. `std::thread` has no
/// timed join, so the pool polls `is_finished` against the deadline.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

struct WorkerHandle {
    slot: usize,
    handle: thread::JoinHandle<()>,
}

/// A started pool of worker threads, exclusively owned by one driver.
pub(crate) struct WorkerPool {
    shutdown: ShutdownToken,
    handles: Vec<WorkerHandle>,
}

impl WorkerPool {
    /// Spawns every worker and waits for each to report its `thread_init`
    /// outcome.
    ///
    /// On any failure the already-started threads are signaled and joined
    /// before the error is returned, so a failed `init` leaves no
    /// partially-started pool behind.
    pub(crate) fn spawn(
        workers: Vec<Worker>,
        shutdown: ShutdownToken,
        startup_timeout: Duration,
    ) -> Result<Self> {
        let worker_count = workers.len();
        info!(worker_count, "spawning delivery workers");

        let (ready_tx, ready_rx) = mpsc::channel();
        let mut handles = Vec::with_capacity(worker_count);

        for worker in workers {
            let slot = worker.slot();
            let ready = ready_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("threadsink-worker-{slot}"))
                .spawn(move || worker.run(ready));

            match spawned {
                Ok(handle) => handles.push(WorkerHandle { slot, handle }),
                Err(e) => {
                    let error = DriverError::worker_init(slot, format!("thread spawn failed: {e}"));
                    Self::rollback(&shutdown, handles, startup_timeout);
                    return Err(error);
                },
            }
        }
        drop(ready_tx);

        // Startup handshake: every worker reports its thread_init outcome
        // before entering its loop.
        for _ in 0..handles.len() {
            match ready_rx.recv_timeout(startup_timeout) {
                Ok(Ok(())) => {},
                Ok(Err(error)) => {
                    Self::rollback(&shutdown, handles, startup_timeout);
                    return Err(error);
                },
                Err(_) => {
                    Self::rollback(&shutdown, handles, startup_timeout);
                    return Err(DriverError::StartupTimeout { timeout: startup_timeout });
                },
            }
        }

        info!(spawned_workers = handles.len(), "all delivery workers started");
        Ok(Self { shutdown, handles })
    }

    /// Signals shutdown and joins every worker within `grace`.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownTimeout` when any thread is still running at the
    /// deadline, or `WorkerPanic` when a joined thread had panicked. Both
    /// are fatal to the process.
    pub(crate) fn shutdown_graceful(mut self, grace: Duration) -> Result<()> {
        info!(
            worker_count = self.handles.len(),
            grace_ms = grace.as_millis() as u64,
            "initiating graceful worker shutdown"
        );

        self.shutdown.signal();
        let handles = std::mem::take(&mut self.handles);
        let result = Self::join_all(handles, grace);

        if result.is_ok() {
            info!("worker pool shutdown completed");
        }
        result
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Best-effort teardown of a partially-started pool. The original
    /// startup error is what the caller reports; straggler problems are
    /// logged here, not returned.
    fn rollback(shutdown: &ShutdownToken, handles: Vec<WorkerHandle>, grace: Duration) {
        shutdown.signal();
        if let Err(error) = Self::join_all(handles, grace) {
            error!(error = %error, "worker rollback after failed startup did not complete cleanly");
        }
    }

    fn join_all(handles: Vec<WorkerHandle>, grace: Duration) -> Result<()> {
        let deadline = Instant::now() + grace;

        loop {
            if handles.iter().all(|worker| worker.handle.is_finished()) {
                break;
            }
            if Instant::now() >= deadline {
                let stuck = handles.iter().filter(|worker| !worker.handle.is_finished()).count();
                error!(stuck, "worker threads did not stop within the grace period");
                return Err(DriverError::ShutdownTimeout { timeout: grace });
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        let mut panicked = None;
        for worker in handles {
            if worker.handle.join().is_err() {
                error!(worker = worker.slot, "worker thread panicked");
                panicked = Some(worker.slot);
            }
        }
        match panicked {
            Some(slot) => Err(DriverError::WorkerPanic { slot }),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let active = self.handles.iter().filter(|worker| !worker.handle.is_finished()).count();
        if active > 0 && !self.shutdown.is_signaled() {
            error!(
                active_workers = active,
                "WorkerPool dropped with active workers, forcing cancellation"
            );
            self.shutdown.signal();
            warn!("call deinit() before dropping the driver to shut workers down cleanly");
        }
    }
}
