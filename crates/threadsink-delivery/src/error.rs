//! Error types for driver lifecycle operations.
//!
//! Per-message and per-connection failures are retried inside the worker
//! and never surface here; this taxonomy covers what the driver's public
//! contract can report: configuration problems at `init` time, worker
//! startup failures, and unrecoverable shutdown conditions.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors surfaced by the driver's public lifecycle contract.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Invalid or missing configuration, detected at `init` time before
    /// any worker thread starts. Fatal to this reload, not to the process.
    #[error("invalid driver configuration: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// A destination hook failed. Destinations use this to describe
    /// thread-local setup failures in their own terms.
    #[error("destination error: {message}")]
    Destination {
        /// Destination-provided failure description.
        message: String,
    },

    /// A worker's thread-local setup failed; the whole pool was rolled
    /// back and `init` did not take effect.
    #[error("worker {slot} failed thread-local setup: {message}")]
    WorkerInit {
        /// Pool slot of the failed worker.
        slot: usize,
        /// Description of the setup failure.
        message: String,
    },

    /// A worker thread did not report its startup outcome in time.
    #[error("worker threads did not report startup within {timeout:?}")]
    StartupTimeout {
        /// How long the driver waited for the startup handshake.
        timeout: Duration,
    },

    /// Worker threads did not stop within the shutdown grace period.
    /// Fatal: the process must abort rather than leak threads silently.
    #[error("worker threads did not stop within {timeout:?}")]
    ShutdownTimeout {
        /// The grace period that was exceeded.
        timeout: Duration,
    },

    /// A worker thread panicked.
    #[error("worker {slot} panicked")]
    WorkerPanic {
        /// Pool slot of the panicked worker.
        slot: usize,
    },
}

impl DriverError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Creates a destination error.
    pub fn destination(message: impl Into<String>) -> Self {
        Self::Destination { message: message.into() }
    }

    /// Creates a worker setup error.
    pub fn worker_init(slot: usize, message: impl Into<String>) -> Self {
        Self::WorkerInit { slot, message: message.into() }
    }

    /// Returns true for conditions the process must not survive.
    ///
    /// A worker that cannot be joined (or that panicked) has left the
    /// process in an unknown state; callers are expected to abort rather
    /// than continue with a leaked thread.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ShutdownTimeout { .. } | Self::WorkerPanic { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_identified_correctly() {
        assert!(DriverError::ShutdownTimeout { timeout: Duration::from_secs(30) }.is_fatal());
        assert!(DriverError::WorkerPanic { slot: 2 }.is_fatal());

        assert!(!DriverError::config("missing address").is_fatal());
        assert!(!DriverError::worker_init(0, "no tls context").is_fatal());
        assert!(!DriverError::StartupTimeout { timeout: Duration::from_secs(5) }.is_fatal());
    }

    #[test]
    fn error_display_format() {
        let error = DriverError::config("destination address is required");
        assert_eq!(
            error.to_string(),
            "invalid driver configuration: destination address is required"
        );

        let error = DriverError::worker_init(3, "allocation failed");
        assert_eq!(error.to_string(), "worker 3 failed thread-local setup: allocation failed");
    }
}
