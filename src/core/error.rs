//! Error types for the GSCAN offload core

use thiserror::Error;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Result type for HAL-facing operations
pub type HalResult<T> = Result<T, HalError>;

/// Errors reported by the radio/firmware driver collaborator
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    #[error("scan failed: {0}")]
    ScanFailed(String),

    #[error("operation not supported by driver: {0}")]
    NotSupported(String),

    #[error("driver unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced synchronously to callers of the configuration APIs
///
/// Runtime scan failures are never returned here; they are delivered
/// asynchronously through the scan-event callback.
#[derive(Error, Debug)]
pub enum HalError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("ring buffer '{0}' is full")]
    BufferFull(String),

    #[error("not available: {0}")]
    NotAvailable(String),

    #[error("request id {0} is already in use")]
    Busy(i32),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}
