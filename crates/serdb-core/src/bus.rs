//! I2C transport abstraction
//!
//! The bridge only needs three primitives: write one byte, write a short
//! byte string, and read one byte, each addressed to a 7-bit I2C target.
//! Each call is one complete bus transaction (START .. STOP).
//!
//! Backends live in their own crates (`serdb-sim`, `serdb-linux-i2c`,
//! `serdb-ftdi`) and are selected at runtime by `serdb-bus`.

use crate::error::BusResult;

/// Byte-level I2C master
pub trait I2cBus {
    /// Write a single byte to `addr`
    fn write_byte(&mut self, addr: u8, byte: u8) -> BusResult<()> {
        self.write_bytes(addr, &[byte])
    }

    /// Write `data` to `addr` in one transaction
    fn write_bytes(&mut self, addr: u8, data: &[u8]) -> BusResult<()>;

    /// Read a single byte from `addr`
    fn read_byte(&mut self, addr: u8) -> BusResult<u8>;

    /// Release the underlying device
    ///
    /// Called once by the session on teardown. Further calls after `close`
    /// are allowed to fail.
    fn close(&mut self) -> BusResult<()> {
        Ok(())
    }
}

impl<B: I2cBus + ?Sized> I2cBus for &mut B {
    fn write_byte(&mut self, addr: u8, byte: u8) -> BusResult<()> {
        (**self).write_byte(addr, byte)
    }

    fn write_bytes(&mut self, addr: u8, data: &[u8]) -> BusResult<()> {
        (**self).write_bytes(addr, data)
    }

    fn read_byte(&mut self, addr: u8) -> BusResult<u8> {
        (**self).read_byte(addr)
    }

    fn close(&mut self) -> BusResult<()> {
        (**self).close()
    }
}

// Boxed buses, so the registry can hand out trait objects
impl<B: I2cBus + ?Sized> I2cBus for Box<B> {
    fn write_byte(&mut self, addr: u8, byte: u8) -> BusResult<()> {
        (**self).write_byte(addr, byte)
    }

    fn write_bytes(&mut self, addr: u8, data: &[u8]) -> BusResult<()> {
        (**self).write_bytes(addr, data)
    }

    fn read_byte(&mut self, addr: u8) -> BusResult<u8> {
        (**self).read_byte(addr)
    }

    fn close(&mut self) -> BusResult<()> {
        (**self).close()
    }
}
