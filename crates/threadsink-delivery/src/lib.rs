//! Threaded output-driver framework for log-processing pipelines.
//!
//! This crate implements the generic machinery every destination plugin
//! reuses: a bounded delivery queue with producer backpressure, a pool of
//! worker threads doing blocking I/O off the pipeline's main loop, and the
//! driver lifecycle the pipeline addresses around startup, shutdown, and
//! configuration reloads. Destination-specific logic (wire formats,
//! connection handles) is injected through the traits in [`destination`];
//! the core never depends on any destination's protocol.
//!
//! # Architecture
//!
//! The pipeline hands messages to the [`Driver`], which enqueues them on
//! the shared [`queue::DeliveryQueue`]. Each worker thread runs the same
//! loop:
//!
//! 1. **Connect** - while disconnected, call the destination's blocking
//!    `connect` with exponential backoff between failures
//! 2. **Dequeue** - take the next message with a bounded wait, so shutdown
//!    and reconnect signals are re-checked without busy-waiting
//! 3. **Deliver** - call the destination's `insert` and interpret the
//!    returned [`threadsink_core::Disposition`]
//! 4. **Advance or retry** - advance the queue only on
//!    `Success`/`Drop`/`Queued`; otherwise re-attempt the same message,
//!    reconnecting first when the disposition demands it
//!
//! # Key guarantees
//!
//! - **Ordered, at-least-once delivery per worker** - retry never skips
//!   ahead of a failing message
//! - **Backpressure, never silent loss** - a full queue hands the message
//!   back to the producer
//! - **Reload-safe** - `deinit` followed by `init` on the same driver
//!   resumes the preserved queue without duplication or loss
//! - **No partially-started pools** - configuration and thread-setup
//!   failures roll back before `init` returns
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use threadsink_core::{Disposition, Message};
//! use threadsink_delivery::{
//!     Destination, DestinationWorker, Driver, DriverConfig, Result,
//! };
//!
//! struct StdoutTarget;
//!
//! impl Destination for StdoutTarget {
//!     fn kind(&self) -> &'static str {
//!         "stdout"
//!     }
//!
//!     fn discriminator(&self) -> String {
//!         "-".to_string()
//!     }
//!
//!     fn create_worker(&self, _slot: usize) -> Box<dyn DestinationWorker> {
//!         Box::new(StdoutWorker)
//!     }
//! }
//!
//! struct StdoutWorker;
//!
//! impl DestinationWorker for StdoutWorker {
//!     fn connect(&mut self) -> bool {
//!         true
//!     }
//!
//!     fn disconnect(&mut self) {}
//!
//!     fn insert(&mut self, message: &Message) -> Disposition {
//!         println!("{}", String::from_utf8_lossy(message.payload()));
//!         Disposition::Success
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let mut driver = Driver::new(Arc::new(StdoutTarget), DriverConfig::default());
//!     driver.init()?;
//!     driver.enqueue(Message::from("hello")).ok();
//!     driver.deinit()?;
//!     driver.free()
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod connection;
pub mod destination;
pub mod driver;
pub mod error;
pub mod naming;
pub mod queue;
pub mod stats;

mod pool;
mod shutdown;
mod worker;

// Re-export the main public API.
pub use backoff::{Backoff, BackoffPolicy};
pub use connection::ConnectionState;
pub use destination::{Destination, DestinationWorker};
pub use driver::{Driver, DriverConfig};
pub use error::{DriverError, Result};
pub use queue::{DeliveryQueue, EnqueueError};
pub use stats::StatsSnapshot;

/// Default worker pool size. One worker is the single-worker
/// compatibility mode with exact per-driver FIFO ordering.
pub const DEFAULT_WORKER_COUNT: usize = 1;

/// Default delivery queue capacity in messages.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
