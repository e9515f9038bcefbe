//! Error types for serdb-core
//!
//! Two layers: [`BusError`] is what a transport reports for a single bus
//! transaction, [`Error`] is what session and register operations report.
//! A mailbox timeout is not an error, see [`crate::mailbox::MailboxReply`].

use thiserror::Error;

/// Errors reported by an [`I2cBus`](crate::bus::I2cBus) implementation
#[derive(Debug, Error)]
pub enum BusError {
    /// The target did not acknowledge the transfer
    #[error("NAK from I2C target 0x{addr:02X}")]
    Nak {
        /// 7-bit target address
        addr: u8,
    },

    /// I/O error from the underlying device
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bus adapter went away
    #[error("bus disconnected")]
    Disconnected,

    /// Failed to open the bus
    #[error("failed to open bus: {0}")]
    Open(String),

    /// USB adapter reported an error
    #[error("USB adapter error: {0}")]
    Usb(String),
}

impl BusError {
    /// True if this is a NAK from the target
    pub fn is_nak(&self) -> bool {
        matches!(self, BusError::Nak { .. })
    }
}

/// Errors from session, register and mailbox operations
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure, passed through unchanged
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Register access before `connect()`
    #[error("SERDB session not connected")]
    NotConnected,

    /// Register access after `close()`
    #[error("SERDB session is closed")]
    Closed,

    /// Address outside of the addressed space
    #[error("address 0x{addr:X} out of range (limit 0x{limit:X})")]
    AddressOutOfRange {
        /// Requested address (or end of range)
        addr: u32,
        /// Highest valid address
        limit: u32,
    },

    /// Mailbox parameter block overflow
    #[error("{count} mailbox parameters given, at most {max} fit")]
    TooManyParams {
        /// Number of parameters passed
        count: usize,
        /// Parameter block size
        max: usize,
    },
}

impl Error {
    /// True if the error came from the transport
    pub fn is_bus(&self) -> bool {
        matches!(self, Error::Bus(_))
    }
}

/// Result type alias for bus transactions
pub type BusResult<T> = core::result::Result<T, BusError>;

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
