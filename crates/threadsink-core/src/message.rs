//! Opaque log message payloads.
//!
//! A [`Message`] is the unit of data the delivery machinery moves from the
//! producer to a destination. The framework never inspects message contents;
//! it only counts and moves them, so the payload is stored as an immutable,
//! cheaply cloneable byte slice.

use std::{fmt, sync::Arc};

/// An immutable unit of log data handed to the delivery queue.
///
/// Cloning is cheap (reference-counted payload), which lets a worker hold on
/// to a message across retry attempts without copying the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    payload: Arc<[u8]>,
}

impl Message {
    /// Creates a message from raw payload bytes.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self { payload: payload.into().into() }
    }

    /// Returns the payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Message {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Contents are opaque to the framework; only the size is meaningful.
        f.debug_struct("Message").field("len", &self.payload.len()).finish()
    }
}
