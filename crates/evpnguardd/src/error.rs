//! Error types for evpnguardd

use thiserror::Error;

/// Failover agent errors
#[derive(Debug, Error)]
pub enum GuardError {
    /// IO error (syslog open/read, status file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Filesystem watch registration error
    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    /// HTTP transport error talking to the management API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Management API returned an error or an unusable response
    #[error("eAPI error: {0}")]
    Eapi(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for evpnguardd operations
pub type Result<T> = std::result::Result<T, GuardError>;
