//! Error types for the FTDI transport

use serdb_core::error::BusError;
use thiserror::Error;

/// Result type for FTDI operations
pub type Result<T> = std::result::Result<T, FtdiError>;

/// Errors that can occur during FTDI operations
#[derive(Debug, Error)]
pub enum FtdiError {
    /// No FTDI device found
    #[error("No FTDI device found")]
    DeviceNotFound,

    /// Failed to open device
    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    /// Failed to configure device
    #[error("Failed to configure device: {0}")]
    ConfigFailed(String),

    /// USB transfer failed
    #[error("USB transfer failed: {0}")]
    TransferFailed(String),

    /// Adapter went away during a transfer
    #[error("FTDI device disconnected: {0}")]
    Disconnected(String),

    /// I2C target did not acknowledge
    #[error("No ACK from I2C target 0x{0:02X}")]
    Nak(u8),

    /// Malformed `ftdi://` URL
    #[error("Invalid FTDI URL: {0}")]
    InvalidUrl(String),

    /// Invalid channel/port specification
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// USB enumeration error
    #[error("USB error: {0}")]
    UsbError(String),
}

impl FtdiError {
    /// Classify a failed USB read or write
    ///
    /// libusb reports an unplugged adapter as "no device" (or libftdi as
    /// "USB device unavailable"); those become [`FtdiError::Disconnected`].
    pub fn transfer(what: &str, e: std::io::Error) -> Self {
        let msg = format!("{} failed: {}", what, e);
        let text = e.to_string().to_ascii_lowercase();
        let gone = matches!(
            e.kind(),
            std::io::ErrorKind::NotConnected | std::io::ErrorKind::BrokenPipe
        ) || text.contains("no device")
            || text.contains("device unavailable")
            || text.contains("device not found");
        if gone {
            FtdiError::Disconnected(msg)
        } else {
            FtdiError::TransferFailed(msg)
        }
    }
}

impl From<nusb::Error> for FtdiError {
    fn from(e: nusb::Error) -> Self {
        FtdiError::UsbError(e.to_string())
    }
}

#[cfg(feature = "libftdi")]
impl From<ftdi::Error> for FtdiError {
    fn from(e: ftdi::Error) -> Self {
        FtdiError::TransferFailed(e.to_string())
    }
}

impl From<FtdiError> for BusError {
    fn from(e: FtdiError) -> Self {
        match e {
            FtdiError::Nak(addr) => BusError::Nak { addr },
            FtdiError::Disconnected(_) => BusError::Disconnected,
            FtdiError::TransferFailed(s) | FtdiError::UsbError(s) => BusError::Usb(s),
            other => BusError::Open(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_mapping() {
        assert!(BusError::from(FtdiError::Nak(0x59)).is_nak());
        assert!(matches!(
            BusError::from(FtdiError::TransferFailed("stall".into())),
            BusError::Usb(_)
        ));
        assert!(matches!(
            BusError::from(FtdiError::DeviceNotFound),
            BusError::Open(_)
        ));
    }

    #[test]
    fn test_unplugged_adapter_is_disconnected() {
        let gone = std::io::Error::other("LIBUSB_ERROR_NO_DEVICE: No device");
        let e = FtdiError::transfer("Write", gone);
        assert!(matches!(e, FtdiError::Disconnected(_)));
        assert!(matches!(BusError::from(e), BusError::Disconnected));

        let pipe = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert!(matches!(
            BusError::from(FtdiError::transfer("Read", pipe)),
            BusError::Disconnected
        ));

        let timeout = std::io::Error::from(std::io::ErrorKind::TimedOut);
        assert!(matches!(
            FtdiError::transfer("Read", timeout),
            FtdiError::TransferFailed(_)
        ));
    }
}
