//! Typed per-component configuration.
//!
//! Every component carries `active` (instantiate it for this trip) and
//! `dry_run` (run the full lifecycle but suppress durable side effects) plus
//! its own knobs. Defaults live in the `Default` impls; override order is
//! deterministic: struct defaults, then command-line overrides. The whole
//! tree is persisted to the trip directory as `trip_options.json`.

use serde::{Deserialize, Serialize};

pub const TRIP_OPTIONS_VERSION: &str = "1.0.0";

/// Root of the per-trip configuration snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TripOptions {
    pub trip: TripMeta,
    pub monitors: MonitorOptions,
    pub sensors: SensorOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TripMeta {
    pub version: String,
}

impl Default for TripMeta {
    fn default() -> Self {
        Self {
            version: TRIP_OPTIONS_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorOptions {
    pub healthmon: HealthMonitorConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorOptions {
    pub systeminfo: SystemInfoConfig,
    pub camera: CameraConfig,
    pub imu: ImuConfig,
    pub gps: GpsConfig,
}

/// Disk-usage watchdog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthMonitorConfig {
    pub active: bool,
    pub dry_run: bool,
    /// Health checks per second.
    pub frequency_hz: f64,
    /// Shut the whole run down when disk usage exceeds this percentage.
    pub disk_usage_threshold: f64,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            active: false,
            dry_run: false,
            frequency_hz: 1.0,
            disk_usage_threshold: 95.0,
        }
    }
}

/// Status display settings (summary log lines; the on-device screen itself
/// is out of scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub active: bool,
    pub dry_run: bool,
    /// Summary lines per second.
    pub framerate: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            active: false,
            dry_run: false,
            framerate: 1.0,
        }
    }
}

/// System telemetry sensor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemInfoConfig {
    pub active: bool,
    pub dry_run: bool,
    pub frequency_hz: f64,
    pub output: String,
    /// Flush the CSV buffer every this many records.
    pub output_write_threshold: usize,
}

impl Default for SystemInfoConfig {
    fn default() -> Self {
        Self {
            active: false,
            dry_run: false,
            frequency_hz: 2.0,
            output: "systeminfo.csv".to_string(),
            output_write_threshold: 20,
        }
    }
}

/// Camera sensor settings. The capture pipeline is an external driver; the
/// core owns the output files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub active: bool,
    pub dry_run: bool,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub output_data: String,
    pub output_metadata: String,
    pub output_metadata_threshold: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            active: false,
            dry_run: false,
            width: 1920,
            height: 1080,
            framerate: 10,
            output_data: "camera.h264".to_string(),
            output_metadata: "camera.csv".to_string(),
            output_metadata_threshold: 300,
        }
    }
}

/// IMU sensor settings. Register access belongs to the external driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    pub active: bool,
    pub dry_run: bool,
    pub frequency_hz: f64,
    pub i2c_bus: u8,
    pub address: u8,
    pub output: String,
    pub output_write_threshold: usize,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            active: false,
            dry_run: false,
            frequency_hz: 10.0,
            i2c_bus: 1,
            address: 0x69,
            output: "imu.csv".to_string(),
            output_write_threshold: 200,
        }
    }
}

/// GPS sensor settings. NMEA parsing belongs to the external driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    pub active: bool,
    pub dry_run: bool,
    pub serial_dev: String,
    pub serial_baudrate: u32,
    pub output: String,
    pub output_write_threshold: usize,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            active: false,
            dry_run: false,
            serial_dev: "/dev/ttyAMA0".to_string(),
            serial_baudrate: 9600,
            output: "gps.csv".to_string(),
            output_write_threshold: 10,
        }
    }
}
