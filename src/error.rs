//! Error handling for the I/O gateway service
//!
//! One service-wide error enum; the variants follow the failure taxonomy of
//! the I/O core (configuration, bus, cache contention, protocol-side value
//! errors, fatal bring-up conditions).

use thiserror::Error;

/// I/O Gateway Service Error Type
#[derive(Error, Debug, Clone)]
pub enum IoSrvError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Bus transaction errors (I2C expanders, ADC)
    #[error("Bus error: {0}")]
    BusError(String),

    /// Bounded cache acquisition exceeded its wait budget
    #[error("Cache timeout: {0}")]
    CacheTimeout(String),

    /// Client supplied a payload of the wrong scalar type
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Index outside the supported channel range
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Timestamp ordering violation on a cache entry
    #[error("Clock error: {0}")]
    ClockError(String),

    /// Unrecoverable bring-up or runtime condition
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Result type alias for the I/O gateway service
pub type Result<T> = std::result::Result<T, IoSrvError>;

impl IoSrvError {
    /// True for conditions that must abort start-up or stop the scheduler
    pub fn is_fatal(&self) -> bool {
        matches!(self, IoSrvError::Fatal(_) | IoSrvError::ClockError(_))
    }
}
