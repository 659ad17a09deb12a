//! # Error Types
//!
//! Custom error types for UART Telemetry using `thiserror`.

use thiserror::Error;

/// Main error type for UART Telemetry
#[derive(Debug, Error)]
pub enum HubError {
    /// Serial port errors (open, read, write)
    #[error("Serial error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// RTC read or host clock update errors
    #[error("Clock error: {0}")]
    Clock(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for UART Telemetry
pub type Result<T> = std::result::Result<T, HubError>;
