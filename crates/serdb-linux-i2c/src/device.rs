//! Linux I2C device implementation
//!
//! This module provides the `LinuxI2c` struct that implements the `I2cBus`
//! trait using Linux's i2c-dev interface. Every `write(2)` and `read(2)` on
//! the character device is one complete I2C transaction.

use crate::error::{LinuxI2cError, Result};

use serdb_core::bus::I2cBus;
use serdb_core::error::BusResult;

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;

/// Linux i2c-dev ioctl constants
mod ioctl {
    use nix::ioctl_write_int_bad;

    /// Use this target address for following reads and writes
    const I2C_SLAVE: u16 = 0x0703;

    ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);
}

/// Configuration for opening a Linux I2C device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxI2cConfig {
    /// Device path (e.g., "/dev/i2c-1")
    pub device: String,
}

impl LinuxI2cConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Configuration for bus number `bus`
    pub fn for_bus(bus: u32) -> Self {
        Self::new(format!("/dev/i2c-{}", bus))
    }

    /// Parse `/dev/i2c-N` or a bare bus number
    pub fn parse(name: &str) -> Result<Self> {
        if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            let bus = name
                .parse()
                .map_err(|_| LinuxI2cError::InvalidBus(name.to_string()))?;
            return Ok(Self::for_bus(bus));
        }
        match name.strip_prefix("/dev/i2c-") {
            Some(n) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
                Ok(Self::new(name))
            }
            _ => Err(LinuxI2cError::InvalidBus(name.to_string())),
        }
    }
}

/// I2C master using the i2c-dev interface
///
/// This struct implements the `I2cBus` trait for Linux systems using
/// the `/dev/i2c-N` device interface.
pub struct LinuxI2c {
    /// File handle for the i2c-dev device, `None` once closed
    file: Option<File>,
    /// Device path, for messages
    path: String,
    /// Target address currently selected with I2C_SLAVE
    target: Option<u8>,
}

impl LinuxI2c {
    /// Open a Linux I2C device with the given configuration
    pub fn open(config: &LinuxI2cConfig) -> Result<Self> {
        log::debug!("linux_i2c: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxI2cError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        log::info!("linux_i2c: Opened {}", config.device);

        Ok(Self {
            file: Some(file),
            path: config.device.clone(),
            target: None,
        })
    }

    /// Open a device by path or bus number
    pub fn open_device(name: &str) -> Result<Self> {
        Self::open(&LinuxI2cConfig::parse(name)?)
    }

    /// Device path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// True once [`I2cBus::close`] released the device
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(LinuxI2cError::Closed)
    }

    fn set_target(&mut self, addr: u8) -> Result<()> {
        let fd = self.file()?.as_raw_fd();
        if self.target == Some(addr) {
            return Ok(());
        }
        unsafe {
            ioctl::i2c_set_slave(fd, addr as libc::c_int).map_err(|e| {
                LinuxI2cError::SetAddressFailed {
                    addr,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }
        log::trace!("linux_i2c: Target address 0x{:02X}", addr);
        self.target = Some(addr);
        Ok(())
    }

    /// Write `data` to `addr` as one transaction
    fn i2c_write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        self.set_target(addr)?;
        let n = self
            .file()?
            .write(data)
            .map_err(|e| map_transfer_error(addr, e))?;
        if n != data.len() {
            return Err(LinuxI2cError::ShortTransfer {
                done: n,
                expected: data.len(),
            });
        }
        Ok(())
    }

    /// Read `buf.len()` bytes from `addr` as one transaction
    fn i2c_read(&mut self, addr: u8, buf: &mut [u8]) -> Result<()> {
        self.set_target(addr)?;
        let n = self
            .file()?
            .read(buf)
            .map_err(|e| map_transfer_error(addr, e))?;
        if n != buf.len() {
            return Err(LinuxI2cError::ShortTransfer {
                done: n,
                expected: buf.len(),
            });
        }
        Ok(())
    }
}

/// Adapters report a missing ACK as ENXIO or EREMOTEIO
fn map_transfer_error(addr: u8, e: std::io::Error) -> LinuxI2cError {
    match e.raw_os_error() {
        Some(libc::ENXIO) | Some(libc::EREMOTEIO) => LinuxI2cError::Nak(addr),
        _ => LinuxI2cError::TransferFailed(e),
    }
}

impl I2cBus for LinuxI2c {
    fn write_bytes(&mut self, addr: u8, data: &[u8]) -> BusResult<()> {
        Ok(self.i2c_write(addr, data)?)
    }

    fn read_byte(&mut self, addr: u8) -> BusResult<u8> {
        let mut buf = [0u8; 1];
        self.i2c_read(addr, &mut buf)?;
        Ok(buf[0])
    }

    fn close(&mut self) -> BusResult<()> {
        if self.file.take().is_some() {
            log::debug!("linux_i2c: Closed {}", self.path);
        }
        self.target = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serdb_core::error::BusError;

    #[test]
    fn test_parse_bus() {
        assert_eq!(
            LinuxI2cConfig::parse("/dev/i2c-1").unwrap().device,
            "/dev/i2c-1"
        );
        assert_eq!(LinuxI2cConfig::parse("7").unwrap().device, "/dev/i2c-7");
        assert!(LinuxI2cConfig::parse("/dev/i2c-").is_err());
        assert!(LinuxI2cConfig::parse("/dev/spidev0.0").is_err());
        assert!(LinuxI2cConfig::parse("").is_err());
    }

    #[test]
    fn test_nak_errno() {
        let e = map_transfer_error(0x59, std::io::Error::from_raw_os_error(libc::EREMOTEIO));
        assert!(matches!(e, LinuxI2cError::Nak(0x59)));
        let e = map_transfer_error(0x59, std::io::Error::from_raw_os_error(libc::EIO));
        assert!(matches!(e, LinuxI2cError::TransferFailed(_)));
    }

    #[test]
    fn test_open_missing_device() {
        let err = LinuxI2c::open_device("/dev/i2c-250").err().unwrap();
        assert!(matches!(err, LinuxI2cError::OpenFailed { .. }));
    }

    #[test]
    fn test_close_releases_device() {
        let mut bus = LinuxI2c::open(&LinuxI2cConfig::new("/dev/null")).unwrap();
        assert!(!bus.is_closed());
        bus.close().unwrap();
        assert!(bus.is_closed());

        assert!(matches!(
            bus.write_bytes(0x59, b"SERDB"),
            Err(BusError::Disconnected)
        ));
        assert!(matches!(bus.read_byte(0x59), Err(BusError::Disconnected)));
        // Closing twice is fine
        bus.close().unwrap();
    }
}
