//! Test support for threadsink drivers.
//!
//! Provides a scripted in-memory destination whose connect and insert
//! outcomes are programmable per call, an event handler that captures
//! emitted driver events, and small helpers for thread-timing assertions.
//! Everything here is deterministic where possible so driver tests stay
//! reproducible.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod observe;
pub mod scripted;

use std::time::{Duration, Instant};

pub use observe::CollectingHandler;
pub use scripted::ScriptedTarget;
pub use threadsink_core::TestClock;

/// Installs a test-friendly tracing subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `predicate` until it returns true or `timeout` elapses.
///
/// Returns whether the predicate became true. Use this instead of fixed
/// sleeps when waiting on worker threads.
pub fn wait_until(timeout: Duration, predicate: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_until_returns_true_when_predicate_holds() {
        assert!(wait_until(Duration::from_millis(50), || true));
    }

    #[test]
    fn wait_until_times_out_when_predicate_never_holds() {
        let start = Instant::now();
        assert!(!wait_until(Duration::from_millis(30), || false));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
