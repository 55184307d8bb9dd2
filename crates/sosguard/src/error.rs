//! Error types for sosguard.
//!
//! The escalation controller itself never fails: operations attempted in the
//! wrong phase are ignored. These errors cover the surrounding plumbing,
//! namely configuration, the capabilities the controller calls into, and I/O.

use thiserror::Error;

/// The main error type for sosguard operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Capability Errors ===
    /// An alert could not be delivered to its recipients.
    #[error("alert dispatch failed on attempt {attempt}: {message}")]
    Dispatch {
        /// The attempt number that failed.
        attempt: u32,
        /// Description of what went wrong.
        message: String,
    },

    /// The location provider could not produce a fix.
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    /// Coordinates outside the valid range.
    #[error("invalid location: latitude {latitude}, longitude {longitude}")]
    InvalidLocation {
        /// Latitude as given.
        latitude: f64,
        /// Longitude as given.
        longitude: f64,
    },

    // === I/O Errors ===
    /// File system or console operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON output for the CLI failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for sosguard operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new dispatch error.
    #[must_use]
    pub fn dispatch(attempt: u32, message: impl Into<String>) -> Self {
        Self::Dispatch {
            attempt,
            message: message.into(),
        }
    }

    /// Create a new location-unavailable error.
    #[must_use]
    pub fn location_unavailable(message: impl Into<String>) -> Self {
        Self::LocationUnavailable(message.into())
    }
}
