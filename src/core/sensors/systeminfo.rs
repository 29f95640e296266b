//! System telemetry sensor: the one fully software-backed sensor in the
//! tree.
//!
//! Samples filesystem usage, the recorder's own process stats and component
//! temperatures at a configurable rate and publishes them on topic `"all"`.

use std::path::Path;

use sysinfo::{Components, Disks, Pid, ProcessRefreshKind, RefreshKind, System};

use crate::core::bus::{Consumer, Message, Outlet, Payload, Publisher, SensorDriver, Subscriber};
use crate::core::cancel::CancelToken;
use crate::core::config::{SystemInfoConfig, TripOptions};
use crate::core::sensors::CsvSink;
use crate::error::{Result, TriplogError};

/// Per-mount filesystem usage.
#[derive(Debug, Clone)]
pub struct DiskUsage {
    pub mount_point: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub usage_percent: f32,
}

/// The recorder's own process footprint.
#[derive(Debug, Clone, Default)]
pub struct ProcessUsage {
    pub cpu_percent: f32,
    pub mem_rss_bytes: u64,
    pub mem_virtual_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct TemperatureReading {
    pub label: String,
    pub celsius: f32,
}

/// One system telemetry sample.
#[derive(Debug, Clone, Default)]
pub struct SystemReport {
    pub disks: Vec<DiskUsage>,
    pub process: ProcessUsage,
    pub temperatures: Vec<TemperatureReading>,
}

impl SystemReport {
    /// Usage percent of the root filesystem (or the first mount when there
    /// is no "/").
    pub fn root_disk_percent(&self) -> f32 {
        self.disks
            .iter()
            .find(|d| d.mount_point == "/")
            .or_else(|| self.disks.first())
            .map_or(0.0, |d| d.usage_percent)
    }

    pub fn cpu_temperature(&self) -> f32 {
        self.temperatures.first().map_or(0.0, |t| t.celsius)
    }

    /// Compact one-line form for status displays and health logs.
    pub fn summary(&self) -> String {
        format!(
            "cpu={:.1}% rss={}K disk={:.1}%",
            self.process.cpu_percent,
            self.process.mem_rss_bytes / 1024,
            self.root_disk_percent()
        )
    }
}

/// Sensor driver sampling the local system through sysinfo.
pub struct SystemInfoDriver {
    config: SystemInfoConfig,
    refresh: RefreshKind,
    system: System,
    disks: Disks,
    components: Components,
    pid: Pid,
}

impl SystemInfoDriver {
    pub fn new(config: SystemInfoConfig) -> Result<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| TriplogError::sensor(format!("cannot resolve own pid: {}", e)))?;
        let refresh = RefreshKind::nothing().with_processes(
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
        Ok(Self {
            config,
            refresh,
            system: System::new_with_specifics(refresh),
            disks: Disks::new_with_refreshed_list(),
            components: Components::new_with_refreshed_list(),
            pid,
        })
    }

    fn sample(&mut self) -> SystemReport {
        self.system.refresh_specifics(self.refresh);
        self.disks.refresh(true);
        self.components.refresh(true);

        let disks = self
            .disks
            .iter()
            .map(|disk| {
                let total = disk.total_space();
                let available = disk.available_space();
                let used = total.saturating_sub(available);
                DiskUsage {
                    mount_point: disk.mount_point().to_string_lossy().to_string(),
                    total_bytes: total,
                    available_bytes: available,
                    usage_percent: if total > 0 {
                        (used as f32 / total as f32) * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        let process = self
            .system
            .process(self.pid)
            .map(|proc| ProcessUsage {
                cpu_percent: proc.cpu_usage(),
                mem_rss_bytes: proc.memory(),
                mem_virtual_bytes: proc.virtual_memory(),
            })
            .unwrap_or_default();

        let temperatures = self
            .components
            .iter()
            .filter_map(|comp| {
                comp.temperature().map(|celsius| TemperatureReading {
                    label: comp.label().to_string(),
                    celsius,
                })
            })
            .collect();

        SystemReport {
            disks,
            process,
            temperatures,
        }
    }
}

impl SensorDriver for SystemInfoDriver {
    fn topics(&self) -> &[&'static str] {
        &["all"]
    }

    fn run(&mut self, outlet: &Outlet, cancel: &CancelToken) {
        let interval =
            std::time::Duration::from_secs_f64(1.0 / self.config.frequency_hz.max(0.1));
        loop {
            outlet.publish("all", Payload::System(self.sample()));
            if cancel.wait_timeout(interval) {
                break;
            }
        }
    }
}

/// File-writing consumer for system telemetry.
pub struct SystemInfoOutput {
    sink: CsvSink,
}

const HEADER: &[&str] = &[
    "timestamp",
    "process_cpu",
    "process_rss",
    "process_vms",
    "disk_used",
    "temp_cpu",
];

impl SystemInfoOutput {
    pub fn new(path: impl Into<std::path::PathBuf>, write_threshold: usize) -> Self {
        Self {
            sink: CsvSink::new(path, HEADER, write_threshold),
        }
    }
}

impl Consumer for SystemInfoOutput {
    fn on_start(&mut self) -> Result<()> {
        self.sink.open()
    }

    fn on_stop(&mut self) -> Result<()> {
        self.sink.close()
    }

    fn on_message(&mut self, msg: &Message) -> Result<()> {
        let Payload::System(report) = &msg.payload else {
            log::debug!("systeminfo output: ignoring {} payload", msg.source);
            return Ok(());
        };
        self.sink.push(format!(
            "{},{},{},{},{},{}",
            msg.timestamp_ms,
            report.process.cpu_percent,
            report.process.mem_rss_bytes,
            report.process.mem_virtual_bytes,
            report.root_disk_percent(),
            report.cpu_temperature(),
        ))
    }
}

/// Factory used by the registry: pairs the driver-backed publisher with its
/// output subscriber (none in dry-run mode).
pub fn build(options: &TripOptions, out_dir: &Path) -> Result<(Publisher, Option<Subscriber>)> {
    let config = &options.sensors.systeminfo;
    let driver = SystemInfoDriver::new(config.clone())?;
    let publisher = Publisher::new("systeminfo", Box::new(driver));
    let subscriber = if config.dry_run {
        None
    } else {
        let output = SystemInfoOutput::new(out_dir.join(&config.output), config.output_write_threshold);
        Some(Subscriber::new("systeminfo-output", Box::new(output)))
    };
    Ok((publisher, subscriber))
}
