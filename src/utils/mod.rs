//! Shared utilities

pub mod error;

pub use error::{AcquisitionError, AppError, AppResult, DeviceError, PersistenceError};
