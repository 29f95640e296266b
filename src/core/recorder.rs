//! Lifecycle orchestration: starts monitors and sensors for one trip, wires
//! the bus between them and tears everything down in reverse order.
//!
//! Start is transactional per component: a component that fails to start is
//! skipped and fully unwired, and never appears in the active set. Stop walks
//! the active sets in reverse so producers go down before the consumers they
//! feed.

use std::sync::Arc;

use crate::core::bus::{Publisher, Subscriber};
use crate::core::cancel::CancelToken;
use crate::core::monitors::Monitor;
use crate::core::registry::Registry;
use crate::core::trip::Trip;
use crate::error::Result;

/// One started sensor: the publisher plus its optional output subscriber.
struct ActiveSensor {
    publisher: Publisher,
    subscriber: Option<Subscriber>,
}

pub struct Recorder {
    trip: Trip,
    registry: Registry,
    monitors: Vec<Box<dyn Monitor>>,
    sensors: Vec<ActiveSensor>,
    running: bool,
}

impl Recorder {
    pub fn new(trip: Trip) -> Self {
        Self::with_registry(trip, Registry::builtin())
    }

    pub fn with_registry(trip: Trip, registry: Registry) -> Self {
        Self {
            trip,
            registry,
            monitors: Vec::new(),
            sensors: Vec::new(),
            running: false,
        }
    }

    pub fn trip(&self) -> &Trip {
        &self.trip
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn active_monitors(&self) -> usize {
        self.monitors.len()
    }

    pub fn active_sensors(&self) -> usize {
        self.sensors.len()
    }

    /// Start every active component for this trip.
    ///
    /// Monitors first, then sensors, each phase in registration order. A
    /// monitor that accepts a shutdown callback gets one that cancels
    /// `shutdown`; the host observes the token and calls [`stop`](Self::stop).
    /// Component start failures are logged and skipped, never fatal for the
    /// run as a whole.
    pub fn start(&mut self, shutdown: &CancelToken) -> Result<()> {
        if self.running {
            log::warn!("Recorder is already running");
            return Ok(());
        }
        let options = self.trip.options().clone();
        let out_dir = self.trip.directory().to_path_buf();

        for entry in self.registry.active_monitors(&options) {
            let mut monitor = match (entry.build)(&options, &out_dir) {
                Ok(m) => m,
                Err(e) => {
                    log::error!("Cannot build monitor {}: {}", entry.name, e);
                    continue;
                }
            };
            if let Err(e) = monitor.start() {
                log::error!("Cannot start monitor {}: {}", entry.name, e);
                continue;
            }
            let token = shutdown.clone();
            if monitor.register_shutdown_callback(Arc::new(move || token.cancel())) {
                log::debug!("{} accepted the shutdown callback", entry.name);
            }
            self.monitors.push(monitor);
        }

        for entry in self.registry.active_sensors(&options) {
            let (publisher, subscriber) = match (entry.build)(&options, &out_dir) {
                Ok(parts) => parts,
                Err(e) => {
                    log::error!("Cannot build sensor {}: {}", entry.name, e);
                    continue;
                }
            };

            for monitor in &self.monitors {
                publisher.subscribe(&monitor.inlet(), None);
            }

            let mut subscriber = subscriber;
            if let Some(sub) = subscriber.as_mut() {
                publisher.subscribe(&sub.inlet(), None);
                if let Err(e) = sub.start() {
                    log::error!("Cannot start output for sensor {}: {}", entry.name, e);
                    publisher.unsubscribe(&sub.inlet(), None);
                    for monitor in self.monitors.iter().rev() {
                        publisher.unsubscribe(&monitor.inlet(), None);
                    }
                    continue;
                }
            }

            let mut publisher = publisher;
            if let Err(e) = publisher.start() {
                log::error!("Cannot start sensor {}: {}", entry.name, e);
                if let Some(sub) = subscriber.as_mut() {
                    publisher.unsubscribe(&sub.inlet(), None);
                    sub.stop();
                }
                for monitor in self.monitors.iter().rev() {
                    publisher.unsubscribe(&monitor.inlet(), None);
                }
                continue;
            }

            self.sensors.push(ActiveSensor {
                publisher,
                subscriber,
            });
        }

        self.running = true;
        log::info!(
            "Recorder started: {} monitors, {} sensors",
            self.monitors.len(),
            self.sensors.len()
        );
        Ok(())
    }

    /// Stop everything that start brought up, newest first. Sensors go down
    /// before monitors so nothing publishes into a stopped consumer.
    pub fn stop(&mut self) {
        if !self.running {
            log::warn!("Recorder is not running");
            return;
        }

        while let Some(mut sensor) = self.sensors.pop() {
            sensor.publisher.stop();
            if let Some(sub) = sensor.subscriber.as_mut() {
                sensor.publisher.unsubscribe(&sub.inlet(), None);
                sub.stop();
            }
            for monitor in self.monitors.iter().rev() {
                sensor.publisher.unsubscribe(&monitor.inlet(), None);
            }
        }

        while let Some(mut monitor) = self.monitors.pop() {
            monitor.stop();
        }

        self.running = false;
        log::info!("Recorder stopped");
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.running {
            self.stop();
        }
    }
}
