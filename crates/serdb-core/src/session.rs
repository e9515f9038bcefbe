//! SERDB session: lifecycle, channel selection and raw bus access
//!
//! A [`Session`] owns its transport. The bridge's selected channel is sticky
//! hardware state, so the session remembers it and only sends the three
//! select opcodes when the required channel differs. Everything that touches
//! the bus goes through `&mut self`, which is what keeps a single caller in
//! charge of the channel and DRAM window registers.

use std::time::Duration;

use crate::bus::I2cBus;
use crate::error::{Error, Result};
use crate::protocol::*;

/// Default delay after every write and before every read
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1);

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, handshake not sent yet
    Uninitialized,
    /// Handshake in progress
    Initializing,
    /// Handshake done, register access allowed
    Ready,
    /// Exit sent and transport released
    Closed,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 7-bit I2C address of the bridge
    pub address: u8,
    /// Turnaround delay after writes and before reads
    pub delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: SERDB_I2C_ADDR,
            delay: DEFAULT_DELAY,
        }
    }
}

impl SessionConfig {
    /// Set the bridge I2C address
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Set the inter-transaction delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// An exclusive handle on one SERDB bridge
pub struct Session<B: I2cBus> {
    bus: B,
    config: SessionConfig,
    channel: Option<Channel>,
    state: SessionState,
}

impl<B: I2cBus> Session<B> {
    /// Create a session without talking to the bridge yet
    pub fn new(bus: B, config: SessionConfig) -> Self {
        Self {
            bus,
            config,
            channel: None,
            state: SessionState::Uninitialized,
        }
    }

    /// Create a session and run the init handshake
    pub fn open(bus: B, config: SessionConfig) -> Result<Self> {
        let mut session = Self::new(bus, config);
        session.connect()?;
        Ok(session)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Channel the bridge is believed to have selected
    pub fn channel(&self) -> Option<Channel> {
        self.channel
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Borrow the transport
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutably borrow the transport
    ///
    /// Traffic sent this way bypasses channel tracking; call [`reinit`]
    /// afterwards if it may have changed bridge state.
    ///
    /// [`reinit`]: Session::reinit
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Run the init handshake
    ///
    /// Sends the magic, selects channel 0 unconditionally and sends the init
    /// sequence. On failure the session goes back to `Uninitialized`.
    pub fn connect(&mut self) -> Result<()> {
        match self.state {
            SessionState::Ready => return Ok(()),
            SessionState::Closed => return Err(Error::Closed),
            SessionState::Uninitialized | SessionState::Initializing => {}
        }

        self.state = SessionState::Initializing;
        self.channel = None;

        if let Err(e) = self.handshake() {
            self.state = SessionState::Uninitialized;
            self.channel = None;
            return Err(e);
        }

        self.state = SessionState::Ready;
        log::info!(
            "serdb: session ready at I2C address 0x{:02X}",
            self.config.address
        );
        Ok(())
    }

    fn handshake(&mut self) -> Result<()> {
        log::debug!("serdb: writing magic");
        self.write_bytes(SERDB_MAGIC)?;

        // Always re-sent: the bridge may hold any channel from a previous run
        self.send_select(Channel::Xdata)?;

        log::debug!("serdb: sending init sequence {:02X?}", INIT_SEQUENCE);
        for op in INIT_SEQUENCE {
            self.write_opcode(op)?;
        }
        Ok(())
    }

    /// Forget the channel state and redo the handshake
    ///
    /// For use after the caller detected a protocol desync.
    pub fn reinit(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(Error::Closed);
        }
        log::debug!("serdb: reinitializing session");
        self.channel = None;
        self.state = SessionState::Uninitialized;
        self.connect()
    }

    /// Check that the bridge answers
    ///
    /// Connects if needed and reads XDATA 0. Any failure yields `false`.
    pub fn probe(&mut self) -> bool {
        if self.state != SessionState::Ready {
            if let Err(e) = self.connect() {
                log::debug!("serdb: probe connect failed: {}", e);
                return false;
            }
        }
        match self.bus_read(Channel::Xdata, 0x0000) {
            Ok(_) => true,
            Err(e) => {
                log::debug!("serdb: probe read failed: {}", e);
                false
            }
        }
    }

    /// Leave SERDB mode and release the transport
    ///
    /// The disable opcode is best effort. The exit opcode is NAKed by the
    /// bridge, that NAK is expected and not reported. The transport is
    /// closed in every case.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }

        let mut result = Ok(());
        if self.state == SessionState::Ready {
            if let Err(e) = self.write_opcode(CMD_DISABLE_ACCESS) {
                log::warn!("serdb: disable access failed: {}", e);
            }
            match self.write_opcode(CMD_EXIT) {
                Ok(()) => {}
                Err(Error::Bus(e)) if e.is_nak() => {
                    log::debug!("serdb: exit NAKed as expected");
                }
                Err(e) => result = Err(e),
            }
        }

        if let Err(e) = self.bus.close() {
            log::warn!("serdb: closing transport failed: {}", e);
        }
        self.state = SessionState::Closed;
        self.channel = None;
        log::debug!("serdb: session closed");
        result
    }

    /// Stop the 8051 MCU
    pub fn stop_mcu(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.write_opcode(CMD_BEFORE_STOP)?;
        self.write_opcode(CMD_STOP_MCU)?;
        log::debug!("serdb: MCU stopped");
        Ok(())
    }

    /// Resume the 8051 MCU
    pub fn resume_mcu(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.write_opcode(CMD_RESUME_MCU)?;
        log::debug!("serdb: MCU resumed");
        Ok(())
    }

    /// Select `channel` unless it is already selected
    pub fn select_channel(&mut self, channel: Channel) -> Result<()> {
        self.ensure_ready()?;
        if self.channel == Some(channel) {
            return Ok(());
        }
        self.send_select(channel)
    }

    fn send_select(&mut self, channel: Channel) -> Result<()> {
        log::debug!("serdb: selecting channel {} ({})", channel.code(), channel);
        // A failure part way leaves the bridge half-switched
        self.channel = None;
        for op in channel.select_opcodes() {
            self.write_opcode(op)?;
        }
        self.channel = Some(channel);
        Ok(())
    }

    /// Read one byte at `addr` on `channel`
    pub fn bus_read(&mut self, channel: Channel, addr: u32) -> Result<u8> {
        self.select_channel(channel)?;
        self.write_bytes(&BusAccessFrame::read(addr).encode())?;
        let value = self.read_byte()?;
        log::trace!("serdb: [{}] 0x{:08X} -> 0x{:02X}", channel, addr, value);
        Ok(value)
    }

    /// Write one byte at `addr` on `channel`
    pub fn bus_write(&mut self, channel: Channel, addr: u32, value: u8) -> Result<()> {
        self.select_channel(channel)?;
        log::trace!("serdb: [{}] 0x{:08X} <- 0x{:02X}", channel, addr, value);
        self.write_bytes(&BusAccessFrame::write(addr, value).encode())
    }

    pub(crate) fn ensure_ready(&self) -> Result<()> {
        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Closed => Err(Error::Closed),
            SessionState::Uninitialized | SessionState::Initializing => {
                Err(Error::NotConnected)
            }
        }
    }

    // ---- Raw transport access with turnaround delay ----

    fn write_opcode(&mut self, op: u8) -> Result<()> {
        self.bus.write_byte(self.config.address, op)?;
        self.turnaround();
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.bus.write_bytes(self.config.address, data)?;
        self.turnaround();
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.turnaround();
        Ok(self.bus.read_byte(self.config.address)?)
    }

    fn turnaround(&self) {
        if !self.config.delay.is_zero() {
            std::thread::sleep(self.config.delay);
        }
    }
}

impl<B: I2cBus> Drop for Session<B> {
    fn drop(&mut self) {
        if self.state == SessionState::Ready {
            if let Err(e) = self.close() {
                log::warn!("serdb: close on drop failed: {}", e);
            }
        }
    }
}
