//! Inertial measurement payloads and output writer.
//!
//! The register-level driver is an external collaborator; this module owns
//! the typed sample, the tilt derivation and the CSV output.

use std::path::Path;

use crate::core::bus::{Consumer, Message, Payload, Publisher, SensorDriver, Subscriber};
use crate::core::config::ImuConfig;
use crate::core::sensors::CsvSink;
use crate::error::Result;

/// One inertial sample.
///
/// Units follow the sensor's native scaling: gyro in °/s, acceleration in g,
/// derived tilt in degrees.
#[derive(Debug, Clone, Default)]
pub struct ImuSample {
    /// Angular velocity `[x, y, z]` in °/s.
    pub gyro: [f64; 3],
    /// Linear acceleration `[x, y, z]` in g.
    pub accel: [f64; 3],
    /// Derived tilt `[x, y]` in degrees.
    pub tilt: [f64; 2],
}

impl ImuSample {
    pub fn new(gyro: [f64; 3], accel: [f64; 3]) -> Self {
        Self {
            gyro,
            accel,
            tilt: tilt_angles(accel),
        }
    }
}

/// Tilt around x and y derived from the gravity vector.
pub fn tilt_angles(accel: [f64; 3]) -> [f64; 2] {
    fn dist(a: f64, b: f64) -> f64 {
        (a * a + b * b).sqrt()
    }
    let [x, y, z] = accel;
    [
        x.atan2(dist(y, z)).to_degrees(),
        -y.atan2(dist(x, z)).to_degrees(),
    ]
}

/// File-writing consumer for IMU samples.
pub struct ImuOutput {
    sink: CsvSink,
}

const HEADER: &[&str] = &[
    "timestamp", "gyro_x", "gyro_y", "gyro_z", "acc_x", "acc_y", "acc_z", "rot_x", "rot_y",
];

impl ImuOutput {
    pub fn new(path: impl Into<std::path::PathBuf>, write_threshold: usize) -> Self {
        Self {
            sink: CsvSink::new(path, HEADER, write_threshold),
        }
    }
}

impl Consumer for ImuOutput {
    fn on_start(&mut self) -> Result<()> {
        self.sink.open()
    }

    fn on_stop(&mut self) -> Result<()> {
        self.sink.close()
    }

    fn on_message(&mut self, msg: &Message) -> Result<()> {
        let Payload::Imu(sample) = &msg.payload else {
            log::debug!("imu output: ignoring {} payload", msg.source);
            return Ok(());
        };
        self.sink.push(format!(
            "{},{},{},{},{},{},{},{},{}",
            msg.timestamp_ms,
            sample.gyro[0],
            sample.gyro[1],
            sample.gyro[2],
            sample.accel[0],
            sample.accel[1],
            sample.accel[2],
            sample.tilt[0],
            sample.tilt[1],
        ))
    }
}

/// Factory for hosts that supply a hardware driver.
pub fn build_with_driver(
    config: &ImuConfig,
    out_dir: &Path,
    driver: Box<dyn SensorDriver>,
) -> (Publisher, Option<Subscriber>) {
    let publisher = Publisher::new("imu", driver);
    let subscriber = if config.dry_run {
        None
    } else {
        let output = ImuOutput::new(out_dir.join(&config.output), config.output_write_threshold);
        Some(Subscriber::new("imu-output", Box::new(output)))
    };
    (publisher, subscriber)
}
