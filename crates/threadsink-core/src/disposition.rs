//! Delivery attempt outcome codes.
//!
//! A destination reports one [`Disposition`] per delivery attempt. The
//! disposition is the controlling signal for the worker's queue advancement,
//! retry, and reconnection decisions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a single delivery attempt, returned by a destination's
/// `insert` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// The message was delivered. The worker advances past it.
    Success,

    /// The message is unrecoverable for this destination, but the
    /// destination itself is healthy. The worker discards the message and
    /// counts it as dropped, not as an error.
    Drop,

    /// Destination or transport failure. The worker disconnects and
    /// re-attempts the same message after reconnecting.
    Error,

    /// The destination accepted the message asynchronously (batched or
    /// pipelined). Treated as success for queue advancement; completion
    /// confirmation, if any, is destination-specific.
    Queued,

    /// A send was attempted while not connected. The worker disconnects
    /// (a no-op if already disconnected) and re-attempts the same message
    /// after reconnecting.
    NotConnected,

    /// The destination explicitly requests a retry without a reconnect.
    /// The worker applies backoff and re-attempts the same message on the
    /// existing connection.
    Retry,
}

impl Disposition {
    /// Returns true when the worker may advance past the current message.
    ///
    /// Only `Success`, `Drop`, and `Queued` advance the queue; every other
    /// disposition re-attempts the same message, never skipping ahead.
    pub fn advances_queue(self) -> bool {
        matches!(self, Self::Success | Self::Drop | Self::Queued)
    }

    /// Returns true when the disposition forces a disconnect before the
    /// next attempt.
    pub fn requires_reconnect(self) -> bool {
        matches!(self, Self::Error | Self::NotConnected)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Drop => write!(f, "drop"),
            Self::Error => write!(f, "error"),
            Self::Queued => write!(f, "queued"),
            Self::NotConnected => write!(f, "not_connected"),
            Self::Retry => write!(f, "retry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_advancement_classified_correctly() {
        assert!(Disposition::Success.advances_queue());
        assert!(Disposition::Drop.advances_queue());
        assert!(Disposition::Queued.advances_queue());

        assert!(!Disposition::Error.advances_queue());
        assert!(!Disposition::NotConnected.advances_queue());
        assert!(!Disposition::Retry.advances_queue());
    }

    #[test]
    fn reconnect_requirement_classified_correctly() {
        assert!(Disposition::Error.requires_reconnect());
        assert!(Disposition::NotConnected.requires_reconnect());

        assert!(!Disposition::Success.requires_reconnect());
        assert!(!Disposition::Drop.requires_reconnect());
        assert!(!Disposition::Queued.requires_reconnect());
        assert!(!Disposition::Retry.requires_reconnect());
    }

    #[test]
    fn display_uses_snake_case_names() {
        assert_eq!(Disposition::Success.to_string(), "success");
        assert_eq!(Disposition::NotConnected.to_string(), "not_connected");
    }
}
