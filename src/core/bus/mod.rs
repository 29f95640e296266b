//! Publish/subscribe message bus between sensors and their consumers.
//!
//! Sensors publish typed, timestamped messages through an [`Outlet`]; each
//! consumer drains its own bounded queue on a dedicated worker thread. The
//! producer never blocks on a consumer: delivery is a non-blocking enqueue
//! and anything that cannot be enqueued is counted and dropped.

mod message;
mod publisher;
mod report;
mod subscriber;

pub use message::{Message, Payload};
pub use publisher::{Outlet, Publisher, SensorDriver};
pub use report::{HealthEntry, HealthReporter, MonitoredRunner, MonitoredSensor, ReportDrain};
pub use subscriber::{Consumer, Inlet, Subscriber};

/// Lifecycle states shared by bus components.
///
/// The worker thread of a component exists if and only if the component is
/// `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}
