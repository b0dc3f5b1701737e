//! Error types for the host bridge.

use std::io;

use thiserror::Error;

/// Errors that can occur while running the bridge.
#[derive(Debug, Error)]
pub enum HostError {
    /// I/O error on a local resource.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port could not be configured or opened.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The passthrough sink stopped accepting data.
    #[error("passthrough sink error: {0}")]
    Sink(#[source] io::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Ctrl-C handler could not be installed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// The poll thread panicked.
    #[error("poll thread panicked")]
    PollerPanicked,

    /// Shutdown was requested while connecting.
    #[error("shutdown requested")]
    Shutdown,
}

/// Result type alias for host operations.
pub type HostResult<T> = Result<T, HostError>;
