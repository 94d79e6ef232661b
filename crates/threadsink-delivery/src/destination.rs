//! Destination capability traits injected into a driver.
//!
//! These two traits are the only seam where destination-specific logic
//! enters the framework. The driver holds one [`Destination`] and asks it
//! for one [`DestinationWorker`] per pool slot; each worker value moves
//! onto its own thread and owns its connection handle exclusively, so
//! implementations need `Send` but never `Sync`.
//!
//! The framework never depends on any destination's wire format; files,
//! sockets, and queues all plug in through the same five hooks.

use threadsink_core::{Disposition, Message};

use crate::error::Result;

/// A configured destination, shared by the driver and all of its workers.
///
/// Implementations carry the destination-specific configuration (target
/// address, credentials, formatting options) set before `init`; the
/// framework treats that configuration as opaque.
pub trait Destination: Send + Sync + 'static {
    /// Short identifier of the destination kind (`"file"`, `"amqp"`, ...),
    /// used as the first component of stats and persistence names.
    fn kind(&self) -> &'static str;

    /// Destination-specific discriminating value (typically the target
    /// address), used to tell instances of the same kind apart in stats
    /// and persisted state.
    fn discriminator(&self) -> String;

    /// Checks that required destination configuration is present and well
    /// formed. Called by the driver at `init` time, before any worker
    /// thread starts.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the missing or malformed
    /// option; the driver fails that `init` and starts nothing.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Builds the per-thread delivery capability for pool slot `slot`.
    fn create_worker(&self, slot: usize) -> Box<dyn DestinationWorker>;
}

/// Per-thread delivery capability for one destination.
///
/// The framework calls these hooks from the worker's own thread, in this
/// order: `thread_init` once, then any number of `connect` / `insert` /
/// `disconnect` cycles, then `disconnect` and `thread_deinit` at shutdown.
/// All hooks may block freely; isolating that blocking from the pipeline's
/// main loop is the reason the framework exists.
pub trait DestinationWorker: Send {
    /// One-time thread-local setup, run before the delivery loop starts.
    ///
    /// # Errors
    ///
    /// A failure here is fatal to this worker: the driver rolls back the
    /// whole pool and reports the failure from `init`.
    fn thread_init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Thread-local teardown, run after the delivery loop exits.
    fn thread_deinit(&mut self) {}

    /// Opens a connection to the destination. Blocking. Returns true on
    /// success; on failure the worker stays disconnected and backs off.
    fn connect(&mut self) -> bool;

    /// Closes the connection. Must be an idempotent no-op when already
    /// disconnected; the worker also calls it unconditionally at shutdown.
    fn disconnect(&mut self);

    /// Attempts delivery of one message and reports the outcome.
    ///
    /// The worker interprets the returned [`Disposition`]: it advances the
    /// queue only on `Success`/`Drop`/`Queued` and re-attempts the same
    /// message otherwise.
    fn insert(&mut self, message: &Message) -> Disposition;
}
