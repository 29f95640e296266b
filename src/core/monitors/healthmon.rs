//! Disk-usage watchdog: the sole authority that can force the whole system
//! to stop.
//!
//! One synchronous check runs before anything is spawned so a trip never
//! starts on an already-full disk. The periodic loop sleeps to wall-clock
//! boundaries (no cumulative drift) and broadcasts to its shutdown callbacks
//! exactly once when the check fails.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use sysinfo::Disks;

use super::{Monitor, ShutdownCallback};
use crate::core::bus::{
    Consumer, HealthReporter, Inlet, Message, Payload, ReportDrain, Subscriber,
};
use crate::core::cancel::CancelToken;
use crate::core::config::{HealthMonitorConfig, TripOptions};
use crate::error::{Result, TriplogError};

pub const HEALTHMON_NAME: &str = "healthmon";

/// Disk usage of the filesystem backing a path.
///
/// Behind a trait so tests can drive the threshold logic without filling a
/// disk.
pub trait DiskProbe: Send {
    /// Returns `(total_bytes, used_bytes)` for the filesystem backing `path`.
    fn usage(&mut self, path: &Path) -> Result<(u64, u64)>;
}

/// Default probe backed by sysinfo's disk list.
pub struct SysinfoDiskProbe {
    disks: Disks,
}

impl SysinfoDiskProbe {
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoDiskProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskProbe for SysinfoDiskProbe {
    fn usage(&mut self, path: &Path) -> Result<(u64, u64)> {
        self.disks.refresh(true);
        // Longest mount-point prefix wins, so /data beats / for /data/trips.
        let disk = self
            .disks
            .iter()
            .filter(|d| path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| {
                TriplogError::health_check(format!("no filesystem found for {}", path.display()))
            })?;
        let total = disk.total_space();
        let used = total.saturating_sub(disk.available_space());
        Ok((total, used))
    }
}

/// Usage percentage rounded to one decimal place.
///
/// The rounding is part of the contract: threshold comparisons use the
/// rounded value so sub-0.1% fluctuations cannot make the verdict flap.
pub fn usage_percent(total: u64, used: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percent = (used as f64 / total as f64) * 100.0;
    (percent * 10.0).round() / 10.0
}

/// Time remaining until the next wall-clock boundary of `interval`.
///
/// Sleeping this amount instead of a fixed delay keeps checks at a
/// predictable phase and avoids cumulative drift.
fn time_to_next_boundary(now_ms: u64, interval: Duration) -> Duration {
    let interval_ms = (interval.as_millis() as u64).max(1);
    Duration::from_millis(interval_ms - (now_ms % interval_ms))
}

/// Bus-side consumer: logs what the sensors are reporting.
struct HealthLog;

impl Consumer for HealthLog {
    fn on_message(&mut self, msg: &Message) -> Result<()> {
        log::debug!("health message from {}", msg.source);
        if let Payload::System(report) = &msg.payload {
            log::info!("{}: {}", msg.source, report.summary());
        }
        Ok(())
    }
}

pub struct HealthMonitor {
    config: HealthMonitorConfig,
    out_dir: PathBuf,
    running: bool,
    /// Terminal per-run failure flag; reset only by the next start.
    request_stop: Arc<AtomicBool>,
    callbacks: Arc<Mutex<Vec<ShutdownCallback>>>,
    subscriber: Subscriber,
    probe: Option<Box<dyn DiskProbe>>,
    checker: Option<JoinHandle<Box<dyn DiskProbe>>>,
    cancel: CancelToken,
    reporter: HealthReporter,
    drain: Arc<ReportDrain>,
}

impl HealthMonitor {
    pub fn new(config: HealthMonitorConfig, out_dir: &Path) -> Self {
        Self::with_probe(config, out_dir, Box::new(SysinfoDiskProbe::new()))
    }

    pub fn with_probe(
        config: HealthMonitorConfig,
        out_dir: &Path,
        probe: Box<dyn DiskProbe>,
    ) -> Self {
        let (reporter, drain) = HealthReporter::channel();
        Self {
            config,
            out_dir: out_dir.to_path_buf(),
            running: false,
            request_stop: Arc::new(AtomicBool::new(false)),
            callbacks: Arc::new(Mutex::new(Vec::new())),
            subscriber: Subscriber::new(HEALTHMON_NAME, Box::new(HealthLog)),
            probe: Some(probe),
            checker: None,
            cancel: CancelToken::new(),
            reporter,
            drain: Arc::new(drain),
        }
    }

    /// Handle for earlier-generation sensors that report directly instead of
    /// going through the bus.
    pub fn reporter(&self) -> HealthReporter {
        self.reporter.clone()
    }

    /// Whether the terminal failure flag fired during this run.
    pub fn stop_requested(&self) -> bool {
        self.request_stop.load(Ordering::SeqCst)
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    fn check_once(probe: &mut dyn DiskProbe, out_dir: &Path, config: &HealthMonitorConfig) -> Result<bool> {
        let (total, used) = probe.usage(out_dir)?;
        let percent = usage_percent(total, used);
        if !config.dry_run && percent > config.disk_usage_threshold {
            log::info!(
                "Disk usage is at {}% ({}% allowed)",
                percent,
                config.disk_usage_threshold
            );
            return Ok(true);
        }
        Ok(false)
    }
}

impl Monitor for HealthMonitor {
    fn name(&self) -> &str {
        HEALTHMON_NAME
    }

    /// One synchronous check, then the bus subscriber, then the periodic
    /// check thread. A failing initial check is fatal for the start — an
    /// unhealthy run must not begin silently.
    fn start(&mut self) -> Result<()> {
        if self.running {
            log::warn!("{}: trying to start a monitor that is already running", self.name());
            return Ok(());
        }
        self.request_stop.store(false, Ordering::SeqCst);

        let mut probe = match self.probe.take() {
            Some(p) => p,
            None => return Err(TriplogError::start_failure(HEALTHMON_NAME, "probe unavailable")),
        };

        match Self::check_once(probe.as_mut(), &self.out_dir, &self.config) {
            Ok(false) => {}
            Ok(true) => {
                self.request_stop.store(true, Ordering::SeqCst);
                self.probe = Some(probe);
                return Err(TriplogError::health_check(
                    "initial health check failed, refusing to start",
                ));
            }
            Err(e) => {
                self.probe = Some(probe);
                return Err(e);
            }
        }

        if let Err(e) = self.subscriber.start() {
            self.probe = Some(probe);
            return Err(e);
        }

        self.cancel = CancelToken::new();
        let cancel = self.cancel.clone();
        let request_stop = Arc::clone(&self.request_stop);
        let callbacks = Arc::clone(&self.callbacks);
        let drain = Arc::clone(&self.drain);
        let config = self.config.clone();
        let out_dir = self.out_dir.clone();
        let interval = Duration::from_secs_f64(1.0 / config.frequency_hz.max(0.001));

        let checker = thread::Builder::new()
            .name("healthmon-check".to_string())
            .spawn(move || {
                check_loop(probe, out_dir, config, interval, request_stop, callbacks, drain, cancel)
            })?;
        self.checker = Some(checker);
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        if !self.running {
            log::warn!("{}: trying to stop a monitor that is not running", self.name());
            return;
        }
        self.cancel.cancel();
        if let Some(checker) = self.checker.take() {
            match checker.join() {
                Ok(probe) => self.probe = Some(probe),
                Err(_) => log::error!("{}: health check thread panicked", self.name()),
            }
        }
        self.subscriber.stop();
        self.running = false;
        log::info!("Stopped health monitor");
    }

    fn inlet(&self) -> Arc<Inlet> {
        self.subscriber.inlet()
    }

    /// Set semantics: the same callback (by pointer identity) registers only
    /// once. Always accepts — this is the monitor with shutdown authority.
    fn register_shutdown_callback(&mut self, cb: ShutdownCallback) -> bool {
        let mut callbacks = self.callbacks.lock();
        if !callbacks.iter().any(|existing| Arc::ptr_eq(existing, &cb)) {
            callbacks.push(cb);
        }
        true
    }
}

/// Periodic check loop. Broadcasts at most once, then exits; the failure
/// flag stays set until the next start.
#[allow(clippy::too_many_arguments)]
fn check_loop(
    mut probe: Box<dyn DiskProbe>,
    out_dir: PathBuf,
    config: HealthMonitorConfig,
    interval: Duration,
    request_stop: Arc<AtomicBool>,
    callbacks: Arc<Mutex<Vec<ShutdownCallback>>>,
    drain: Arc<ReportDrain>,
    cancel: CancelToken,
) -> Box<dyn DiskProbe> {
    while !cancel.is_cancelled() {
        for entry in drain.drain() {
            log::debug!("direct report from {}: {}", entry.source, entry.state);
        }

        match HealthMonitor::check_once(probe.as_mut(), &out_dir, &config) {
            Ok(true) => request_stop.store(true, Ordering::SeqCst),
            Ok(false) => {}
            Err(e) => log::error!("Health check error: {}", e),
        }

        if request_stop.load(Ordering::SeqCst) {
            let callbacks = callbacks.lock().clone();
            log::info!("Health check failed. Informing {} listeners.", callbacks.len());
            for cb in &callbacks {
                cb();
            }
            break;
        }

        let now_ms = chrono::Utc::now().timestamp_millis() as u64;
        if cancel.wait_timeout(time_to_next_boundary(now_ms, interval)) {
            break;
        }
    }
    probe
}

/// Factory used by the registry.
pub fn build(options: &TripOptions, out_dir: &Path) -> Result<Box<dyn Monitor>> {
    Ok(Box::new(HealthMonitor::new(
        options.monitors.healthmon.clone(),
        out_dir,
    )))
}
