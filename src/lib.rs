// Triplog Library - Public API

// Re-export error types
pub mod error;
pub use error::{Result, TriplogError};

// Module declarations
pub mod core;

// Re-export commonly used types
pub use core::cancel::CancelToken;
pub use core::config::TripOptions;
pub use core::recorder::Recorder;
pub use core::trip::Trip;

// Initialize logging
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
