//! The module contract.
//!
//! A module is a named, independently scheduled logic unit. The host gives
//! each registered module its own worker task and mailbox, so callbacks on
//! one module never run concurrently with themselves — module-local state
//! needs no locking as long as it is only touched from these callbacks.

use crate::host::Router;
use crate::registry::AnyPayload;

/// A named logic unit owned by the host for the process lifetime.
///
/// Payloads are opaque to the host; it routes them by module name without
/// inspection. `on_request` runs on the module's worker, so a slow handler
/// delays that module's queue only.
pub trait Module: Send + 'static {
    /// Unique name, the routing key. Duplicate names are a fatal
    /// configuration error at startup.
    fn name(&self) -> &'static str;

    /// Ticks per second. Zero means this module is never ticked.
    fn tick_rate(&self) -> u32 {
        0
    }

    /// Runs once on the worker before any tick or message is delivered,
    /// and before any listener is active. The router may be kept for
    /// cross-module messaging later.
    fn on_start(&mut self, _router: &Router) {}

    /// Periodic callback at the configured rate. A tick is skipped, not
    /// queued, while the previous one is still running.
    fn on_tick(&mut self) {}

    /// Runs once on the worker during host shutdown, after the last
    /// delivered message.
    fn on_destroy(&mut self) {}

    /// Fire-and-forget delivery.
    fn on_message(&mut self, _msg: AnyPayload) {}

    /// Request/response delivery; the returned value travels back to the
    /// caller blocked in [`Router::request`].
    fn on_request(&mut self, _msg: AnyPayload) -> AnyPayload {
        Box::new(())
    }
}
