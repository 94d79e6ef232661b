//! Per-worker connection lifecycle state.
//!
//! Each worker owns its connection state exclusively; the driver never
//! mutates it. `Connecting` exists only for the span of the blocking
//! `connect` call and is not observable from outside the worker.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a worker's link to its destination.
///
/// Transitions: `Disconnected` → `Connecting` → `Connected` on a successful
/// connect; any `Error`/`NotConnected` disposition returns the worker to
/// `Disconnected`. No state is terminal while the worker thread is alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection; the worker will attempt `connect` before delivering.
    #[default]
    Disconnected,

    /// A blocking `connect` call is in progress.
    Connecting,

    /// The destination is reachable; deliveries may proceed.
    Connected,
}

impl ConnectionState {
    /// Returns true when deliveries may proceed.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}
