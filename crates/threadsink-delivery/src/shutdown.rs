//! Cooperative shutdown signaling for worker threads.
//!
//! Shutdown is never forced: workers observe the token at each loop
//! iteration and at each bounded-wait return, finishing any in-flight
//! blocking call first. Backoff sleeps go through [`ShutdownToken::wait_timeout`]
//! so a sleeping worker wakes as soon as shutdown is signaled.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

/// Clonable cancellation flag shared by a driver and its worker pool.
#[derive(Debug, Clone, Default)]
pub(crate) struct ShutdownToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl ShutdownToken {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Signals shutdown and wakes every waiting worker.
    pub(crate) fn signal(&self) {
        let mut signaled = self.inner.signaled.lock();
        *signaled = true;
        drop(signaled);
        self.inner.condvar.notify_all();
    }

    pub(crate) fn is_signaled(&self) -> bool {
        *self.inner.signaled.lock()
    }

    /// Sleeps up to `timeout`, waking early on shutdown. Returns true when
    /// shutdown was signaled.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.inner.signaled.lock();
        while !*signaled {
            if self.inner.condvar.wait_until(&mut signaled, deadline).timed_out() {
                break;
            }
        }
        *signaled
    }
}
