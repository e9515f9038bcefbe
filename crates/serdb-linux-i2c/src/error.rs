//! Error types for Linux I2C operations

use serdb_core::error::BusError;
use thiserror::Error;

/// Linux I2C specific errors
#[derive(Debug, Error)]
pub enum LinuxI2cError {
    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to select the target address
    #[error("Failed to set I2C target address 0x{addr:02X}: {source}")]
    SetAddressFailed {
        addr: u8,
        #[source]
        source: std::io::Error,
    },

    /// Transfer was not acknowledged
    #[error("No ACK from 0x{0:02X}")]
    Nak(u8),

    /// I2C transfer failed
    #[error("I2C transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),

    /// Short transfer
    #[error("Short transfer: {done} of {expected} bytes")]
    ShortTransfer { done: usize, expected: usize },

    /// Device was released by `close()`
    #[error("I2C device is closed")]
    Closed,

    /// Bus specification could not be parsed
    #[error("Invalid I2C bus '{0}'. Use /dev/i2c-N or a bus number")]
    InvalidBus(String),
}

impl From<LinuxI2cError> for BusError {
    fn from(e: LinuxI2cError) -> Self {
        match e {
            LinuxI2cError::Nak(addr) => BusError::Nak { addr },
            LinuxI2cError::TransferFailed(io) if io.raw_os_error() == Some(libc::ENODEV) => {
                BusError::Disconnected
            }
            LinuxI2cError::TransferFailed(io) => BusError::Io(io),
            LinuxI2cError::Closed => BusError::Disconnected,
            LinuxI2cError::OpenFailed { .. }
            | LinuxI2cError::InvalidBus(_)
            | LinuxI2cError::SetAddressFailed { .. } => BusError::Open(e.to_string()),
            LinuxI2cError::ShortTransfer { .. } => BusError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                e.to_string(),
            )),
        }
    }
}

/// Result type for Linux I2C operations
pub type Result<T> = std::result::Result<T, LinuxI2cError>;
