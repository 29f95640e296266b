//! Monitors: consumers with systemic authority, not tied to one sensor.

pub mod display;
pub mod healthmon;

use std::sync::Arc;

use crate::core::bus::Inlet;
use crate::error::Result;

/// Callback invoked when a monitor decides the whole run must stop.
pub type ShutdownCallback = Arc<dyn Fn() + Send + Sync>;

/// Lifecycle contract the recorder drives for every monitor.
///
/// Monitors are subscribers first: the recorder wires their [`Inlet`] into
/// every sensor publisher. A monitor with shutdown authority additionally
/// accepts shutdown callbacks.
pub trait Monitor: Send {
    fn name(&self) -> &str;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self);

    /// Enqueue handle the recorder subscribes to each sensor publisher.
    fn inlet(&self) -> Arc<Inlet>;

    /// Offer a shutdown callback. Returns whether this monitor accepted it;
    /// most monitors have no shutdown authority and decline.
    fn register_shutdown_callback(&mut self, _cb: ShutdownCallback) -> bool {
        false
    }
}
