//! Error types and handling
//!
//! Component errors for acquisition, persistence and the device gateway,
//! aggregated into the application-wide error type.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures raised while waiting on an open device stream
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Frame set didn't arrive within {0:?}")]
    Timeout(Duration),

    #[error("Device disconnected: {0}")]
    Disconnected(String),

    #[error("Stream is closed")]
    Closed,
}

/// Failure to append a row to a record file
#[derive(Error, Debug)]
#[error("Cannot write {path:?}: {source}")]
pub struct PersistenceError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Failures raised by a device gateway when opening or closing a stream
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No device with serial {0}")]
    NotFound(String),

    #[error("Device stream is already open")]
    Busy,

    #[error("Stream configuration rejected: {0}")]
    Config(String),
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Device {serial} is not connected")]
    DeviceUnavailable { serial: String },

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::DeviceUnavailable { .. } => "DEVICE_UNAVAILABLE",
            AppError::Device(_) => "DEVICE_ERROR",
            AppError::Acquisition(_) => "ACQUISITION_ERROR",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::Session(_) => "SESSION_ERROR",
            AppError::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    /// Process exit status reported for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::DeviceUnavailable { .. } => 1,
            AppError::InvalidInput(_) => 2,
            AppError::Acquisition(_) | AppError::Device(_) => 3,
            AppError::Persistence(_) | AppError::Io(_) => 4,
            AppError::Serialization(_) | AppError::Session(_) => 5,
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
