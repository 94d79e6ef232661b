//! Core domain types for the threadsink output-driver framework.
//!
//! Provides the opaque message unit, the delivery disposition codes, the
//! clock abstraction used for testable timing, and the delivery event layer
//! that drivers emit for observability. The delivery machinery itself lives
//! in `threadsink-delivery`; everything here is destination-agnostic and
//! free of I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod disposition;
pub mod events;
pub mod message;
pub mod time;

pub use disposition::Disposition;
pub use events::{DriverEvent, EventHandler, MulticastEventHandler, NoOpEventHandler};
pub use message::Message;
pub use time::{Clock, RealClock, TestClock};
