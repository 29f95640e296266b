//! Static registry of monitor and sensor constructors.
//!
//! The recorder asks the registry which components apply to a trip and how
//! to build them. Entries are plain data: a name, an activity predicate over
//! the trip options and a factory closure. Hosts and tests extend an empty
//! registry with their own entries; `builtin` wires the components that ship
//! with the crate.

use std::path::Path;

use crate::core::bus::{Publisher, Subscriber};
use crate::core::config::TripOptions;
use crate::core::monitors::{self, Monitor};
use crate::core::sensors;
use crate::error::Result;

pub type ActiveFn = Box<dyn Fn(&TripOptions) -> bool + Send + Sync>;
pub type MonitorFactory = Box<dyn Fn(&TripOptions, &Path) -> Result<Box<dyn Monitor>> + Send + Sync>;
pub type SensorFactory =
    Box<dyn Fn(&TripOptions, &Path) -> Result<(Publisher, Option<Subscriber>)> + Send + Sync>;

pub struct MonitorEntry {
    pub name: &'static str,
    pub active: ActiveFn,
    pub build: MonitorFactory,
}

pub struct SensorEntry {
    pub name: &'static str,
    pub active: ActiveFn,
    pub build: SensorFactory,
}

/// Registration order is start order; the recorder stops in reverse.
pub struct Registry {
    monitors: Vec<MonitorEntry>,
    sensors: Vec<SensorEntry>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            monitors: Vec::new(),
            sensors: Vec::new(),
        }
    }

    /// The components that ship with the crate. Monitors come before sensors
    /// so every consumer is ready when acquisition begins; the health monitor
    /// comes first so nothing outlives its supervision.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register_monitor(
            monitors::healthmon::HEALTHMON_NAME,
            Box::new(|options| options.monitors.healthmon.active),
            Box::new(monitors::healthmon::build),
        );
        registry.register_monitor(
            monitors::display::DISPLAY_NAME,
            Box::new(|options| options.monitors.display.active),
            Box::new(monitors::display::build),
        );
        registry.register_sensor(
            "systeminfo",
            Box::new(|options| options.sensors.systeminfo.active),
            Box::new(sensors::systeminfo::build),
        );
        registry
    }

    pub fn register_monitor(&mut self, name: &'static str, active: ActiveFn, build: MonitorFactory) {
        self.monitors.push(MonitorEntry { name, active, build });
    }

    pub fn register_sensor(&mut self, name: &'static str, active: ActiveFn, build: SensorFactory) {
        self.sensors.push(SensorEntry { name, active, build });
    }

    pub fn monitors(&self) -> &[MonitorEntry] {
        &self.monitors
    }

    pub fn sensors(&self) -> &[SensorEntry] {
        &self.sensors
    }

    /// Monitor entries whose predicate accepts `options`, in registration
    /// order.
    pub fn active_monitors<'a>(
        &'a self,
        options: &'a TripOptions,
    ) -> impl Iterator<Item = &'a MonitorEntry> {
        self.monitors.iter().filter(move |e| (e.active)(options))
    }

    /// Sensor entries whose predicate accepts `options`, in registration
    /// order.
    pub fn active_sensors<'a>(
        &'a self,
        options: &'a TripOptions,
    ) -> impl Iterator<Item = &'a SensorEntry> {
        self.sensors.iter().filter(move |e| (e.active)(options))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}
