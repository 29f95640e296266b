//! Sensor payload types, output writers and the factories that pair a
//! publisher with its file-writing subscriber.
//!
//! Hardware access (camera pipeline, IMU registers, NMEA parsing) lives in
//! external drivers behind [`SensorDriver`](crate::core::bus::SensorDriver);
//! this module owns what the core is responsible for: the typed payloads and
//! the durable per-sensor outputs under the trip directory.

pub mod camera;
mod csv_sink;
pub mod gps;
pub mod imu;
pub mod systeminfo;

pub use csv_sink::CsvSink;
