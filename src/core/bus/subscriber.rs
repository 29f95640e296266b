//! Consumer side of the bus: a bounded queue drained by a dedicated worker
//! thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;

use super::{LifecycleState, Message};
use crate::error::{Result, TriplogError};

/// How long the worker blocks on its queue before re-checking the
/// cancellation token. Bounds the extra latency a stop request can see.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default bound for a subscriber's message queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Message-processing hooks supplied by a concrete consumer (file writer,
/// display, health monitor).
///
/// `on_message` runs on the subscriber's worker thread; an `Err` is logged
/// and the run continues — losing one batch of telemetry is preferable to
/// aborting a trip. `on_start`/`on_stop` are optional resource hooks.
pub trait Consumer: Send {
    fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_message(&mut self, msg: &Message) -> Result<()>;
}

/// Shared enqueue handle handed to publishers.
///
/// Delivery never blocks: when the subscriber is not running, or its queue is
/// full, the message is dropped and counted.
pub struct Inlet {
    name: String,
    running: AtomicBool,
    tx: Mutex<Option<Sender<Arc<Message>>>>,
    dropped: AtomicU64,
}

impl Inlet {
    fn new(name: String) -> Self {
        Self {
            name,
            running: AtomicBool::new(false),
            tx: Mutex::new(None),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Messages dropped because the subscriber was not running or its queue
    /// was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of messages currently queued.
    pub fn queue_len(&self) -> usize {
        self.tx.lock().as_ref().map_or(0, |tx| tx.len())
    }

    /// Non-blocking enqueue used by [`Outlet::publish`](super::Outlet).
    pub(crate) fn deliver(&self, msg: Arc<Message>) {
        if !self.is_running() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            log::debug!("{}: dropping message, subscriber not running", self.name);
            return;
        }
        let guard = self.tx.lock();
        match guard.as_ref() {
            Some(tx) => match tx.try_send(msg) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!("{}: dropping message, queue unavailable", self.name);
                }
            },
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Runtime wrapper that owns a [`Consumer`], its bounded queue and its worker
/// thread.
///
/// Invariants: the worker thread exists iff the subscriber is `Running`, and
/// the queue is created fresh on every start — messages still queued when the
/// subscriber stops are discarded, never flushed. Consumers that must not
/// lose processed data flush incrementally (see
/// [`CsvSink`](crate::core::sensors::CsvSink)).
pub struct Subscriber {
    name: String,
    dry_run: bool,
    capacity: usize,
    state: LifecycleState,
    consumer: Option<Box<dyn Consumer>>,
    worker: Option<JoinHandle<Box<dyn Consumer>>>,
    cancel: crate::core::cancel::CancelToken,
    inlet: Arc<Inlet>,
}

impl Subscriber {
    pub fn new(name: impl Into<String>, consumer: Box<dyn Consumer>) -> Self {
        Self::with_capacity(name, consumer, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        name: impl Into<String>,
        consumer: Box<dyn Consumer>,
        capacity: usize,
    ) -> Self {
        let name = name.into();
        Self {
            inlet: Arc::new(Inlet::new(name.clone())),
            name,
            dry_run: false,
            capacity,
            state: LifecycleState::Stopped,
            consumer: Some(consumer),
            worker: None,
            cancel: crate::core::cancel::CancelToken::new(),
        }
    }

    /// Run the full lifecycle but suppress durable side effects downstream.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn dropped_messages(&self) -> u64 {
        self.inlet.dropped()
    }

    /// Enqueue handle for publishers. Cheap to clone, safe to hold across
    /// start/stop cycles.
    pub fn inlet(&self) -> Arc<Inlet> {
        Arc::clone(&self.inlet)
    }

    /// Start the consumer hook, create a fresh queue and spawn the worker.
    ///
    /// On failure the subscriber stays `Stopped` and must not be registered
    /// as active by the caller.
    pub fn start(&mut self) -> Result<()> {
        if self.state != LifecycleState::Stopped {
            log::warn!("{}: trying to start a subscriber that is not stopped", self.name);
            return Ok(());
        }
        self.state = LifecycleState::Starting;

        let mut consumer = match self.consumer.take() {
            Some(c) => c,
            None => {
                // A previous worker panicked and took the consumer with it.
                self.state = LifecycleState::Stopped;
                return Err(TriplogError::start_failure(&self.name, "consumer unavailable"));
            }
        };

        if let Err(e) = consumer.on_start() {
            log::error!("Error starting {}: {}", self.name, e);
            self.consumer = Some(consumer);
            self.state = LifecycleState::Stopped;
            return Err(TriplogError::start_failure(&self.name, e.to_string()));
        }

        let (tx, rx) = bounded(self.capacity);
        *self.inlet.tx.lock() = Some(tx);
        self.cancel = crate::core::cancel::CancelToken::new();

        let cancel = self.cancel.clone();
        let name = self.name.clone();
        let worker = thread::Builder::new()
            .name(format!("{}-consumer", self.name))
            .spawn(move || consume_loop(name, consumer, rx, cancel))?;

        self.worker = Some(worker);
        self.inlet.running.store(true, Ordering::Release);
        self.state = LifecycleState::Running;
        Ok(())
    }

    /// Stop the worker, discard the queue backlog and run the stop hook.
    pub fn stop(&mut self) {
        if self.state != LifecycleState::Running {
            log::warn!("{}: trying to stop a subscriber that is not running", self.name);
            return;
        }
        self.state = LifecycleState::Stopping;

        self.inlet.running.store(false, Ordering::Release);
        self.cancel.cancel();
        // Dropping the sender disconnects the queue; whatever is still
        // buffered goes down with the receiver.
        *self.inlet.tx.lock() = None;

        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(mut consumer) => {
                    if let Err(e) = consumer.on_stop() {
                        log::error!("Error stopping {}: {}", self.name, e);
                    }
                    self.consumer = Some(consumer);
                }
                Err(_) => {
                    log::error!("{}: consumer worker panicked", self.name);
                }
            }
        }

        self.state = LifecycleState::Stopped;
    }
}

/// Worker loop: drain the queue in FIFO order until cancelled.
///
/// Returns the consumer so the owning subscriber can run `on_stop` after the
/// join. The backlog is intentionally not drained after cancellation.
fn consume_loop(
    name: String,
    mut consumer: Box<dyn Consumer>,
    rx: Receiver<Arc<Message>>,
    cancel: crate::core::cancel::CancelToken,
) -> Box<dyn Consumer> {
    while !cancel.is_cancelled() {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(msg) => {
                if let Err(e) = consumer.on_message(&msg) {
                    log::error!("{}: error processing message: {}", name, e);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    consumer
}
