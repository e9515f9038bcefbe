//! Register address spaces on top of a session
//!
//! - XDATA: 16-bit 8051 external data, channel 0, one transaction per byte.
//! - DRAM: 24-bit shared memory, channel 0. The high byte goes to the window
//!   register at XDATA 0x0000, then the low 16 bits are accessed. The window
//!   is rewritten on every access; other masters may move it in between.
//! - RIU: 16-bit little-endian registers at `bank << 8 | offset`, on the PM
//!   or non-PM RIU channel.
//!
//! There are no retries here. A failed transaction is returned as is.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bus::I2cBus;
use crate::error::{Error, Result};
use crate::protocol::{
    split_dram_addr, Channel, DRAM_MAX_ADDR, DRAM_WINDOW_REG, XDATA_MAX_ADDR,
};
use crate::session::Session;

/// Byte access to XDATA
///
/// The mailbox and device wrappers only need this, so they are generic over
/// it rather than tied to a concrete session type.
pub trait XdataAccess {
    /// Read one XDATA byte
    fn read_xdata(&mut self, addr: u16) -> Result<u8>;

    /// Write one XDATA byte
    fn write_xdata(&mut self, addr: u16, value: u8) -> Result<()>;
}

impl<B: I2cBus> XdataAccess for Session<B> {
    fn read_xdata(&mut self, addr: u16) -> Result<u8> {
        Session::read_xdata(self, addr)
    }

    fn write_xdata(&mut self, addr: u16, value: u8) -> Result<()> {
        Session::write_xdata(self, addr, value)
    }
}

impl<T: XdataAccess + ?Sized> XdataAccess for &mut T {
    fn read_xdata(&mut self, addr: u16) -> Result<u8> {
        (**self).read_xdata(addr)
    }

    fn write_xdata(&mut self, addr: u16, value: u8) -> Result<()> {
        (**self).write_xdata(addr, value)
    }
}

/// Result of a scan that may be stopped part way
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome<T> {
    /// The whole range was covered
    Complete(T),
    /// The running flag was cleared; holds what was gathered so far
    Cancelled(T),
}

impl<T> ScanOutcome<T> {
    /// True if the scan stopped early
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanOutcome::Cancelled(_))
    }

    /// The gathered data, complete or not
    pub fn into_inner(self) -> T {
        match self {
            ScanOutcome::Complete(t) | ScanOutcome::Cancelled(t) => t,
        }
    }
}

/// A byte that differs between two DRAM regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Difference {
    /// Offset from the start of both regions
    pub offset: u32,
    /// Byte in the first region
    pub first: u8,
    /// Byte in the second region
    pub second: u8,
}

/// Reject ranges that run past `limit`
fn check_range(start: u32, len: usize, limit: u32) -> Result<()> {
    if len == 0 {
        return if start > limit {
            Err(Error::AddressOutOfRange { addr: start, limit })
        } else {
            Ok(())
        };
    }
    let end = start as u64 + len as u64 - 1;
    if end > limit as u64 {
        return Err(Error::AddressOutOfRange {
            addr: end.min(u32::MAX as u64) as u32,
            limit,
        });
    }
    Ok(())
}

impl<B: I2cBus> Session<B> {
    // ---- XDATA ----

    /// Read one XDATA byte
    pub fn read_xdata(&mut self, addr: u16) -> Result<u8> {
        self.bus_read(Channel::Xdata, addr as u32)
    }

    /// Write one XDATA byte
    pub fn write_xdata(&mut self, addr: u16, value: u8) -> Result<()> {
        self.bus_write(Channel::Xdata, addr as u32, value)
    }

    /// Read `len` XDATA bytes starting at `start`, one transaction each
    pub fn read_xdata_range(&mut self, start: u16, len: usize) -> Result<Vec<u8>> {
        check_range(start as u32, len, XDATA_MAX_ADDR)?;
        (0..len)
            .map(|i| self.read_xdata(start + i as u16))
            .collect()
    }

    /// Read an XDATA range, checking `running` before every byte
    pub fn dump_xdata(
        &mut self,
        start: u16,
        len: usize,
        running: &AtomicBool,
        mut progress: impl FnMut(usize),
    ) -> Result<ScanOutcome<Vec<u8>>> {
        check_range(start as u32, len, XDATA_MAX_ADDR)?;
        let mut data = Vec::with_capacity(len);
        for i in 0..len {
            if !running.load(Ordering::SeqCst) {
                log::warn!("serdb: XDATA dump cancelled after {} bytes", i);
                return Ok(ScanOutcome::Cancelled(data));
            }
            data.push(self.read_xdata(start + i as u16)?);
            progress(i + 1);
        }
        Ok(ScanOutcome::Complete(data))
    }

    // ---- DRAM ----

    fn set_dram_window(&mut self, addr: u32) -> Result<u16> {
        if addr > DRAM_MAX_ADDR {
            return Err(Error::AddressOutOfRange {
                addr,
                limit: DRAM_MAX_ADDR,
            });
        }
        let (window, low) = split_dram_addr(addr);
        self.write_xdata(DRAM_WINDOW_REG, window)?;
        Ok(low)
    }

    /// Read one DRAM byte
    pub fn read_dram(&mut self, addr: u32) -> Result<u8> {
        let low = self.set_dram_window(addr)?;
        self.read_xdata(low)
    }

    /// Write one DRAM byte
    pub fn write_dram(&mut self, addr: u32, value: u8) -> Result<()> {
        let low = self.set_dram_window(addr)?;
        self.write_xdata(low, value)
    }

    /// Read `len` DRAM bytes starting at `start`
    pub fn read_dram_range(&mut self, start: u32, len: usize) -> Result<Vec<u8>> {
        check_range(start, len, DRAM_MAX_ADDR)?;
        (0..len)
            .map(|i| self.read_dram(start + i as u32))
            .collect()
    }

    /// Write `data` to DRAM starting at `start`, one byte at a time
    pub fn write_dram_range(&mut self, start: u32, data: &[u8]) -> Result<()> {
        check_range(start, data.len(), DRAM_MAX_ADDR)?;
        for (i, &byte) in data.iter().enumerate() {
            self.write_dram(start + i as u32, byte)?;
        }
        Ok(())
    }

    /// Read a DRAM range, checking `running` before every byte
    pub fn dump_dram(
        &mut self,
        start: u32,
        len: usize,
        running: &AtomicBool,
        mut progress: impl FnMut(usize),
    ) -> Result<ScanOutcome<Vec<u8>>> {
        check_range(start, len, DRAM_MAX_ADDR)?;
        let mut data = Vec::with_capacity(len);
        for i in 0..len {
            if !running.load(Ordering::SeqCst) {
                log::warn!("serdb: DRAM dump cancelled after {} bytes", i);
                return Ok(ScanOutcome::Cancelled(data));
            }
            data.push(self.read_dram(start + i as u32)?);
            progress(i + 1);
        }
        Ok(ScanOutcome::Complete(data))
    }

    /// Find every occurrence of `pattern` in DRAM `[start, end)`
    ///
    /// Overlapping matches are all reported. Returns match addresses.
    pub fn search_dram(
        &mut self,
        start: u32,
        end: u32,
        pattern: &[u8],
        running: &AtomicBool,
        mut progress: impl FnMut(usize),
    ) -> Result<ScanOutcome<Vec<u32>>> {
        let len = end.saturating_sub(start) as usize;
        check_range(start, len, DRAM_MAX_ADDR)?;
        let mut matches = Vec::new();
        if pattern.is_empty() {
            return Ok(ScanOutcome::Complete(matches));
        }

        let mut tail = VecDeque::with_capacity(pattern.len());
        for i in 0..len {
            if !running.load(Ordering::SeqCst) {
                return Ok(ScanOutcome::Cancelled(matches));
            }
            let addr = start + i as u32;
            if tail.len() == pattern.len() {
                tail.pop_front();
            }
            tail.push_back(self.read_dram(addr)?);
            if tail.len() == pattern.len() && tail.iter().eq(pattern.iter()) {
                let found = addr + 1 - pattern.len() as u32;
                log::info!("serdb: pattern found at 0x{:06X}", found);
                matches.push(found);
            }
            progress(i + 1);
        }
        Ok(ScanOutcome::Complete(matches))
    }

    /// Compare `len` bytes at `first` and `second`
    pub fn compare_dram(
        &mut self,
        first: u32,
        second: u32,
        len: usize,
        running: &AtomicBool,
        mut progress: impl FnMut(usize),
    ) -> Result<ScanOutcome<Vec<Difference>>> {
        check_range(first, len, DRAM_MAX_ADDR)?;
        check_range(second, len, DRAM_MAX_ADDR)?;
        let mut diffs = Vec::new();
        for i in 0..len {
            if !running.load(Ordering::SeqCst) {
                return Ok(ScanOutcome::Cancelled(diffs));
            }
            let offset = i as u32;
            let a = self.read_dram(first + offset)?;
            let b = self.read_dram(second + offset)?;
            if a != b {
                diffs.push(Difference {
                    offset,
                    first: a,
                    second: b,
                });
            }
            progress(i + 1);
        }
        Ok(ScanOutcome::Complete(diffs))
    }

    // ---- RIU ----

    /// Read a 16-bit RIU register
    pub fn read_riu(&mut self, bank: u8, offset: u8, pm: bool) -> Result<u16> {
        let channel = Channel::riu(pm);
        let addr = (bank as u32) << 8 | offset as u32;
        let low = self.bus_read(channel, addr)?;
        let high = self.bus_read(channel, addr + 1)?;
        Ok(u16::from_le_bytes([low, high]))
    }

    /// Write a 16-bit RIU register
    pub fn write_riu(&mut self, bank: u8, offset: u8, value: u16, pm: bool) -> Result<()> {
        let channel = Channel::riu(pm);
        let addr = (bank as u32) << 8 | offset as u32;
        let [low, high] = value.to_le_bytes();
        self.bus_write(channel, addr, low)?;
        self.bus_write(channel, addr + 1, high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{test_config, Op, RecordingBus};

    fn open() -> Session<RecordingBus> {
        let mut session = Session::open(RecordingBus::new(), test_config()).unwrap();
        session.bus_mut().ops.clear();
        session
    }

    #[test]
    fn test_dram_always_writes_window() {
        let mut session = open();
        session.write_dram(0x123456, 0x42).unwrap();
        session.read_dram(0x123456).unwrap();
        assert_eq!(
            session.bus().ops,
            vec![
                Op::Write(vec![0x10, 0, 0, 0x00, 0x00, 0x12]),
                Op::Write(vec![0x10, 0, 0, 0x34, 0x56, 0x42]),
                Op::Write(vec![0x10, 0, 0, 0x00, 0x00, 0x12]),
                Op::Write(vec![0x10, 0, 0, 0x34, 0x56]),
                Op::Read,
            ]
        );
    }

    #[test]
    fn test_dram_address_limit() {
        let mut session = open();
        assert!(matches!(
            session.read_dram(0x0100_0000),
            Err(Error::AddressOutOfRange { .. })
        ));
        assert!(session.bus().ops.is_empty());
    }

    #[test]
    fn test_riu_little_endian() {
        let mut session = open();
        session.write_riu(0x1E, 0x04, 0xBEEF, false).unwrap();
        let ops = session.bus().ops.clone();
        assert_eq!(
            ops,
            vec![
                Op::Write(vec![0x80]),
                Op::Write(vec![0x82]),
                Op::Write(vec![0x85]),
                Op::Write(vec![0x10, 0, 0, 0x1E, 0x04, 0xEF]),
                Op::Write(vec![0x10, 0, 0, 0x1E, 0x05, 0xBE]),
            ]
        );
        assert_eq!(session.read_riu(0x1E, 0x04, false).unwrap(), 0xBEEF);
        assert_eq!(session.channel(), Some(Channel::NonPmRiu));
    }

    #[test]
    fn test_riu_pm_channel() {
        let mut session = open();
        session.read_riu(0x10, 0x00, true).unwrap();
        assert_eq!(session.channel(), Some(Channel::PmRiu));
        assert_eq!(session.bus().select_count(), 3);
    }

    #[test]
    fn test_xdata_range() {
        let mut session = open();
        for (i, b) in [1u8, 2, 3].iter().enumerate() {
            session.write_xdata(0x4000 + i as u16, *b).unwrap();
        }
        assert_eq!(session.read_xdata_range(0x4000, 3).unwrap(), vec![1, 2, 3]);
        assert!(session.read_xdata_range(0xFFFF, 2).is_err());
        assert_eq!(session.read_xdata_range(0xFFFF, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_dump_cancelled_returns_partial() {
        let mut session = open();
        let running = AtomicBool::new(true);
        let outcome = session
            .dump_xdata(0x0100, 16, &running, |n| {
                if n == 4 {
                    running.store(false, Ordering::SeqCst);
                }
            })
            .unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.into_inner().len(), 4);
    }

    #[test]
    fn test_check_range() {
        assert!(check_range(0xFFFF, 1, XDATA_MAX_ADDR).is_ok());
        assert!(check_range(0xFFFF, 2, XDATA_MAX_ADDR).is_err());
        assert!(check_range(0, 0, XDATA_MAX_ADDR).is_ok());
        assert!(check_range(0xFF_FFFF, 1, DRAM_MAX_ADDR).is_ok());
    }
}
