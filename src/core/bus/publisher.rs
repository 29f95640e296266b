//! Producer side of the bus: topic registry, synchronous fan-out and the
//! acquisition thread wrapper.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;

use super::{Inlet, LifecycleState, Message, Payload};
use crate::core::cancel::CancelToken;
use crate::error::{Result, TriplogError};

/// The narrow seam to sensor hardware.
///
/// The core never sees registers, serial ports or camera pipelines — it hands
/// the driver a fan-out handle and a cancellation token and expects the
/// acquisition loop to publish until cancelled.
pub trait SensorDriver: Send {
    /// The fixed set of topics this sensor publishes on. Must not change for
    /// the lifetime of the instance.
    fn topics(&self) -> &[&'static str];

    /// Acquire hardware resources. An `Err` means the sensor did not start.
    fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Acquisition loop. Runs on a dedicated thread; must return promptly
    /// once `cancel` fires.
    fn run(&mut self, outlet: &Outlet, cancel: &CancelToken);

    /// Release hardware resources.
    fn on_stop(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Shared fan-out handle: the topic→subscriber registry plus the publish
/// path.
///
/// The registry is only mutated by the recorder during its single-threaded
/// start/stop phases; the lock exists because the acquisition thread reads it
/// concurrently. Publishing to a topic nobody subscribed to is a silent
/// no-op.
pub struct Outlet {
    source: String,
    registry: RwLock<Vec<(String, Vec<Arc<Inlet>>)>>,
}

impl Outlet {
    fn new(source: String) -> Self {
        Self {
            source,
            registry: RwLock::new(Vec::new()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Stamp and fan out one value to every subscriber of `topic`, in
    /// registration order. Per-subscriber delivery is non-blocking; a slow
    /// consumer never stalls the acquisition thread.
    pub fn publish(&self, topic: &str, payload: Payload) {
        let msg = Arc::new(Message::new(self.source.clone(), topic, payload));
        let registry = self.registry.read();
        if let Some((_, inlets)) = registry.iter().find(|(t, _)| t == topic) {
            for inlet in inlets {
                inlet.deliver(Arc::clone(&msg));
            }
        }
    }

    fn subscribe(&self, inlet: &Arc<Inlet>, topic: &str) {
        let mut registry = self.registry.write();
        match registry.iter_mut().find(|(t, _)| t == topic) {
            Some((_, inlets)) => {
                if !inlets.iter().any(|i| Arc::ptr_eq(i, inlet)) {
                    inlets.push(Arc::clone(inlet));
                }
            }
            None => registry.push((topic.to_string(), vec![Arc::clone(inlet)])),
        }
    }

    fn unsubscribe(&self, inlet: &Arc<Inlet>, topic: &str) {
        let mut registry = self.registry.write();
        if let Some((_, inlets)) = registry.iter_mut().find(|(t, _)| t == topic) {
            inlets.retain(|i| !Arc::ptr_eq(i, inlet));
        }
    }

    fn subscriber_count(&self, topic: &str) -> usize {
        self.registry
            .read()
            .iter()
            .find(|(t, _)| t == topic)
            .map_or(0, |(_, inlets)| inlets.len())
    }
}

/// Runtime wrapper that owns a [`SensorDriver`], its acquisition thread and
/// the shared [`Outlet`].
///
/// Lifecycle mirrors [`Subscriber`](super::Subscriber) minus the queue: the
/// publish path is synchronous.
pub struct Publisher {
    name: String,
    topics: Vec<&'static str>,
    outlet: Arc<Outlet>,
    state: LifecycleState,
    driver: Option<Box<dyn SensorDriver>>,
    worker: Option<JoinHandle<Box<dyn SensorDriver>>>,
    cancel: CancelToken,
}

impl Publisher {
    pub fn new(name: impl Into<String>, driver: Box<dyn SensorDriver>) -> Self {
        let name = name.into();
        Self {
            topics: driver.topics().to_vec(),
            outlet: Arc::new(Outlet::new(name.clone())),
            name,
            state: LifecycleState::Stopped,
            driver: Some(driver),
            worker: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fixed set of topics offered by this publisher.
    pub fn offer(&self) -> &[&'static str] {
        &self.topics
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Fan-out handle, used by drivers that publish from outside `run` and
    /// by tests.
    pub fn outlet(&self) -> Arc<Outlet> {
        Arc::clone(&self.outlet)
    }

    /// Register `inlet` for `topic`, or for every offered topic when `topic`
    /// is `None`. Idempotent per topic.
    pub fn subscribe(&self, inlet: &Arc<Inlet>, topic: Option<&str>) {
        match topic {
            Some(topic) => self.outlet.subscribe(inlet, topic),
            None => {
                for topic in &self.topics {
                    self.outlet.subscribe(inlet, topic);
                }
            }
        }
    }

    /// Remove `inlet` from `topic`, or from every offered topic when `topic`
    /// is `None`.
    pub fn unsubscribe(&self, inlet: &Arc<Inlet>, topic: Option<&str>) {
        match topic {
            Some(topic) => self.outlet.unsubscribe(inlet, topic),
            None => {
                for topic in &self.topics {
                    self.outlet.unsubscribe(inlet, topic);
                }
            }
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.outlet.subscriber_count(topic)
    }

    /// Run the driver's start hook and spawn the acquisition thread.
    pub fn start(&mut self) -> Result<()> {
        if self.state != LifecycleState::Stopped {
            log::warn!("{}: trying to start a publisher that is not stopped", self.name);
            return Ok(());
        }
        self.state = LifecycleState::Starting;

        let mut driver = match self.driver.take() {
            Some(d) => d,
            None => {
                self.state = LifecycleState::Stopped;
                return Err(TriplogError::start_failure(&self.name, "driver unavailable"));
            }
        };

        if let Err(e) = driver.on_start() {
            log::error!("Error starting {}: {}", self.name, e);
            self.driver = Some(driver);
            self.state = LifecycleState::Stopped;
            return Err(TriplogError::start_failure(&self.name, e.to_string()));
        }

        self.cancel = CancelToken::new();
        let cancel = self.cancel.clone();
        let outlet = Arc::clone(&self.outlet);
        let worker = thread::Builder::new()
            .name(format!("{}-sensor", self.name))
            .spawn(move || {
                driver.run(&outlet, &cancel);
                driver
            })?;

        self.worker = Some(worker);
        self.state = LifecycleState::Running;
        Ok(())
    }

    /// Cancel the acquisition loop, join it and run the driver's stop hook.
    pub fn stop(&mut self) {
        if self.state != LifecycleState::Running {
            log::warn!("{}: trying to stop a publisher that is not running", self.name);
            return;
        }
        self.state = LifecycleState::Stopping;

        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(mut driver) => {
                    if let Err(e) = driver.on_stop() {
                        log::error!("Error stopping {}: {}", self.name, e);
                    }
                    self.driver = Some(driver);
                }
                Err(_) => {
                    log::error!("{}: acquisition thread panicked", self.name);
                }
            }
        }

        self.state = LifecycleState::Stopped;
    }
}
