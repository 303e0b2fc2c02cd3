//! Error types for mount transports

use thiserror::Error;

/// Errors that can occur constructing or driving a transport channel
#[derive(Debug, Error)]
pub enum TransportError {
    /// Device index does not match the requested device kind
    #[error("invalid device index: {0}")]
    InvalidIndex(i32),

    /// Serial configuration value outside the supported range
    #[error("invalid serial configuration: {0}")]
    InvalidConfig(String),

    /// Channel used before a successful open
    #[error("channel is not open")]
    NotOpen,

    /// Failed to open the underlying medium
    #[error("failed to open {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    /// Serial port error
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
