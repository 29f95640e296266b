use std::io;
use thiserror::Error;

/// Custom error type for the triplog application
#[derive(Error, Debug)]
pub enum TriplogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Trip error: {0}")]
    Trip(String),

    #[error("Failed to start {component}: {reason}")]
    StartFailure { component: String, reason: String },

    #[error("Health check failed: {0}")]
    HealthCheck(String),

    #[error("Sensor error: {0}")]
    Sensor(String),
}

/// Result type alias for the triplog application
pub type Result<T> = std::result::Result<T, TriplogError>;

impl TriplogError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        TriplogError::Config(msg.into())
    }

    /// Create a trip error
    pub fn trip<S: Into<String>>(msg: S) -> Self {
        TriplogError::Trip(msg.into())
    }

    /// Create a start failure for a named component
    pub fn start_failure<C: Into<String>, R: Into<String>>(component: C, reason: R) -> Self {
        TriplogError::StartFailure {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Create a health check error (fatal during the health monitor's start)
    pub fn health_check<S: Into<String>>(msg: S) -> Self {
        TriplogError::HealthCheck(msg.into())
    }

    pub fn sensor<S: Into<String>>(msg: S) -> Self {
        TriplogError::Sensor(msg.into())
    }
}
