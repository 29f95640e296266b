//! Direct-report variant used by earlier-generation sensors.
//!
//! Before the generic publish/subscribe bus, a sensor pushed health entries
//! straight to the single health monitor. The seam is kept for sensors that
//! have not been ported yet; the recorder itself only wires the bus
//! generation.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::LifecycleState;
use crate::core::cancel::CancelToken;
use crate::error::{Result, TriplogError};

/// One state report pushed by a monitored sensor.
#[derive(Debug, Clone)]
pub struct HealthEntry {
    /// Wall-clock report time, epoch milliseconds.
    pub timestamp_ms: i64,
    /// Name of the reporting sensor.
    pub source: String,
    /// Free-form state description.
    pub state: String,
}

/// Handle a monitored sensor uses to push entries to the health monitor.
#[derive(Clone)]
pub struct HealthReporter {
    tx: Sender<HealthEntry>,
}

impl HealthReporter {
    /// Create a reporter together with the drain the health monitor reads.
    pub fn channel() -> (HealthReporter, ReportDrain) {
        let (tx, rx) = unbounded();
        (HealthReporter { tx }, ReportDrain { rx })
    }

    pub fn report(&self, source: impl Into<String>, state: impl Into<String>) {
        let entry = HealthEntry {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            source: source.into(),
            state: state.into(),
        };
        // The drain side going away just means nobody is listening anymore.
        let _ = self.tx.send(entry);
    }
}

/// Receiving side of the direct-report channel.
pub struct ReportDrain {
    rx: Receiver<HealthEntry>,
}

impl ReportDrain {
    /// Drain every entry currently buffered without blocking.
    pub fn drain(&self) -> Vec<HealthEntry> {
        self.rx.try_iter().collect()
    }
}

/// Lifecycle contract of an earlier-generation sensor.
pub trait MonitoredSensor: Send {
    fn name(&self) -> &str;

    fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Acquisition loop; reports through `reporter` until cancelled.
    fn run(&mut self, reporter: &HealthReporter, cancel: &CancelToken);

    fn on_stop(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Thread bookkeeping for a [`MonitoredSensor`], mirroring
/// [`Publisher`](super::Publisher) minus the topic registry.
pub struct MonitoredRunner {
    name: String,
    reporter: HealthReporter,
    state: LifecycleState,
    sensor: Option<Box<dyn MonitoredSensor>>,
    worker: Option<JoinHandle<Box<dyn MonitoredSensor>>>,
    cancel: CancelToken,
}

impl MonitoredRunner {
    pub fn new(sensor: Box<dyn MonitoredSensor>, reporter: HealthReporter) -> Self {
        Self {
            name: sensor.name().to_string(),
            reporter,
            state: LifecycleState::Stopped,
            sensor: Some(sensor),
            worker: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn start(&mut self) -> Result<()> {
        if self.state != LifecycleState::Stopped {
            log::warn!("{}: trying to start a sensor that is not stopped", self.name);
            return Ok(());
        }
        self.state = LifecycleState::Starting;

        let mut sensor = match self.sensor.take() {
            Some(s) => s,
            None => {
                self.state = LifecycleState::Stopped;
                return Err(TriplogError::start_failure(&self.name, "sensor unavailable"));
            }
        };

        if let Err(e) = sensor.on_start() {
            log::error!("Error starting {}: {}", self.name, e);
            self.sensor = Some(sensor);
            self.state = LifecycleState::Stopped;
            return Err(TriplogError::start_failure(&self.name, e.to_string()));
        }

        self.cancel = CancelToken::new();
        let cancel = self.cancel.clone();
        let reporter = self.reporter.clone();
        let worker = thread::Builder::new()
            .name(format!("{}-sensor", self.name))
            .spawn(move || {
                sensor.run(&reporter, &cancel);
                sensor
            })?;

        self.worker = Some(worker);
        self.state = LifecycleState::Running;
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.state != LifecycleState::Running {
            log::warn!("{}: trying to stop a sensor that is not running", self.name);
            return;
        }
        self.state = LifecycleState::Stopping;

        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(mut sensor) => {
                    if let Err(e) = sensor.on_stop() {
                        log::error!("Error stopping {}: {}", self.name, e);
                    }
                    self.sensor = Some(sensor);
                }
                Err(_) => {
                    log::error!("{}: sensor thread panicked", self.name);
                }
            }
        }

        self.state = LifecycleState::Stopped;
    }
}
