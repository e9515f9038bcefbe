//! FTDI MPSSE I2C master
//!
//! This module provides the `FtdiI2c` struct that implements I2C on top of
//! FTDI's MPSSE engine and the `I2cBus` trait. Each bus transaction is
//! queued as one MPSSE command buffer and flushed with a single USB write.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use ftdi::{find_by_vid_pid, BitMode, Device, Interface};
use serdb_core::bus::I2cBus;
use serdb_core::error::BusResult;

use crate::config::FtdiConfig;
use crate::error::{FtdiError, Result};
use crate::protocol::*;

/// How long to wait for MPSSE response bytes
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// FTDI MPSSE I2C master
pub struct FtdiI2c {
    device: Device,
}

impl FtdiI2c {
    /// Open an FTDI device with the given configuration
    pub fn open(config: &FtdiConfig) -> Result<Self> {
        let interface = match config.interface {
            FtdiInterface::A => Interface::A,
            FtdiInterface::B => Interface::B,
            FtdiInterface::C => Interface::C,
            FtdiInterface::D => Interface::D,
        };

        let vid = config.device_type.vendor_id();
        let pid = config.device_type.product_id();

        log::debug!("Looking for FTDI device VID={:04X} PID={:04X}", vid, pid);

        let mut device = find_by_vid_pid(vid, pid)
            .interface(interface)
            .open()
            .map_err(|e| FtdiError::OpenFailed(format!("{}", e)))?;

        log::debug!("Opened FTDI device VID={:04X} PID={:04X}", vid, pid);

        // Reset USB device
        device
            .usb_reset()
            .map_err(|e| FtdiError::ConfigFailed(format!("USB reset failed: {}", e)))?;

        // Set latency timer (2ms for best performance)
        device
            .set_latency_timer(2)
            .map_err(|e| FtdiError::ConfigFailed(format!("Set latency timer failed: {}", e)))?;

        // Set MPSSE bitbang mode
        device
            .set_bitmode(0x00, BitMode::Mpsse)
            .map_err(|e| FtdiError::ConfigFailed(format!("Set MPSSE mode failed: {}", e)))?;

        let mut ftdi = FtdiI2c { device };

        let mut buf = Vec::with_capacity(16);
        push_init(&mut buf, config.frequency_hz);
        ftdi.send(&buf)?;

        log::info!(
            "FTDI {} interface {} configured for I2C at {} kHz",
            config.device_type.name(),
            config.interface.letter(),
            divisor_to_frequency(clock_divisor(config.frequency_hz)) / 1000
        );

        Ok(ftdi)
    }

    /// Open from an `ftdi://` URL
    pub fn open_url(url: &str) -> Result<Self> {
        Self::open(&FtdiConfig::from_url(url)?)
    }

    /// Send data to the FTDI device
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.device
            .write_all(data)
            .map_err(|e| FtdiError::transfer("Write", e))?;
        log::trace!("Sent {} bytes", data.len());
        Ok(())
    }

    /// Receive exactly `len` bytes from the FTDI device
    fn recv(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut total = 0;
        let deadline = Instant::now() + READ_TIMEOUT;

        while total < len {
            match self.device.read(&mut buf[total..]) {
                Ok(0) => {
                    if Instant::now() >= deadline {
                        return Err(FtdiError::TransferFailed(format!(
                            "Read timed out after {} of {} bytes",
                            total, len
                        )));
                    }
                    // No data available, wait a bit
                    std::thread::sleep(Duration::from_micros(100));
                }
                Ok(n) => {
                    total += n;
                }
                Err(e) => {
                    return Err(FtdiError::transfer("Read", e));
                }
            }
        }

        log::trace!("Received {} bytes", total);
        Ok(buf)
    }

    /// Write `data` to `addr`, failing on the first NAK
    fn i2c_write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        self.send(&build_write(addr, data))?;
        let acks = self.recv(data.len() + 1)?;
        if acks.iter().copied().any(is_nak) {
            return Err(FtdiError::Nak(addr));
        }
        Ok(())
    }

    /// Read one byte from `addr`
    fn i2c_read(&mut self, addr: u8) -> Result<u8> {
        self.send(&build_read(addr))?;
        let resp = self.recv(2)?;
        if is_nak(resp[0]) {
            return Err(FtdiError::Nak(addr));
        }
        Ok(resp[1])
    }

    /// Release I/O pins (set all as inputs)
    fn release_pins(&mut self) -> Result<()> {
        let buf = [SET_BITS_LOW, 0x00, 0x00];
        self.send(&buf)
    }
}

impl Drop for FtdiI2c {
    fn drop(&mut self) {
        // Release I/O pins on close
        if let Err(e) = self.release_pins() {
            log::warn!("Failed to release pins on close: {}", e);
        }
        // Device will be closed automatically when dropped
    }
}

impl I2cBus for FtdiI2c {
    fn write_bytes(&mut self, addr: u8, data: &[u8]) -> BusResult<()> {
        Ok(self.i2c_write(addr, data)?)
    }

    fn read_byte(&mut self, addr: u8) -> BusResult<u8> {
        Ok(self.i2c_read(addr)?)
    }

    fn close(&mut self) -> BusResult<()> {
        Ok(self.release_pins()?)
    }
}
