//! GPS position payloads and output writer.
//!
//! NMEA parsing and serial access live in the external driver; missing
//! values come through as 0.0 so the CSV stays rectangular.

use std::path::Path;

use crate::core::bus::{Consumer, Message, Payload, Publisher, SensorDriver, Subscriber};
use crate::core::config::GpsConfig;
use crate::core::sensors::CsvSink;
use crate::error::Result;

/// One position fix, decimal degrees and meters.
#[derive(Debug, Clone, Default)]
pub struct GpsFix {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
}

/// File-writing consumer for GPS fixes.
pub struct GpsOutput {
    sink: CsvSink,
}

const HEADER: &[&str] = &["timestamp", "longitude", "latitude", "altitude"];

impl GpsOutput {
    pub fn new(path: impl Into<std::path::PathBuf>, write_threshold: usize) -> Self {
        Self {
            sink: CsvSink::new(path, HEADER, write_threshold),
        }
    }
}

impl Consumer for GpsOutput {
    fn on_start(&mut self) -> Result<()> {
        self.sink.open()
    }

    fn on_stop(&mut self) -> Result<()> {
        self.sink.close()
    }

    fn on_message(&mut self, msg: &Message) -> Result<()> {
        let Payload::Gps(fix) = &msg.payload else {
            log::debug!("gps output: ignoring {} payload", msg.source);
            return Ok(());
        };
        self.sink.push(format!(
            "{},{},{},{}",
            msg.timestamp_ms, fix.longitude, fix.latitude, fix.altitude
        ))
    }
}

/// Factory for hosts that supply a hardware driver.
pub fn build_with_driver(
    config: &GpsConfig,
    out_dir: &Path,
    driver: Box<dyn SensorDriver>,
) -> (Publisher, Option<Subscriber>) {
    let publisher = Publisher::new("gps", driver);
    let subscriber = if config.dry_run {
        None
    } else {
        let output = GpsOutput::new(out_dir.join(&config.output), config.output_write_threshold);
        Some(Subscriber::new("gps-output", Box::new(output)))
    };
    (publisher, subscriber)
}
