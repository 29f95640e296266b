//! Core recording framework: message bus, lifecycle orchestration, monitors
//! and sensor outputs.

pub mod bus;
pub mod cancel;
pub mod config;
pub mod monitors;
pub mod recorder;
pub mod registry;
pub mod sensors;
pub mod trip;
