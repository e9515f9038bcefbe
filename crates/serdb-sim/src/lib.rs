//! serdb-sim - In-memory SERDB bridge emulator
//!
//! This crate provides an [`I2cBus`] that behaves like a SERDB bridge in
//! front of XDATA, DRAM and both RIU spaces. It's useful for testing and
//! development without a board on the bench.
//!
//! # DRAM window
//!
//! A channel 0 write to XDATA 0x0000 stores the window byte and arms the
//! window. The next channel 0 access frame is then routed to
//! `DRAM[window << 16 | low16]` and disarms it. Every other channel 0 frame
//! goes to XDATA. This is what a session does for each DRAM byte, so DRAM
//! and XDATA traffic can be interleaved freely.

use std::collections::HashMap;

use serdb_core::bus::I2cBus;
use serdb_core::error::{BusError, BusResult};
use serdb_core::protocol::{
    apply_select_opcode, BusAccessFrame, Channel, CMD_DISABLE_ACCESS, CMD_ENABLE_ACCESS,
    CMD_EXIT, CMD_RESUME_MCU, CMD_STOP_MCU, DRAM_WINDOW_REG, SERDB_I2C_ADDR, SERDB_MAGIC,
};

/// XDATA size
pub const XDATA_SIZE: usize = 0x1_0000;
/// DRAM size reachable through the window
pub const DRAM_SIZE: usize = 0x100_0000;
/// Size of each RIU space
pub const RIU_SIZE: usize = 0x1_0000;

/// Value returned for unmapped reads
pub const OPEN_BUS: u8 = 0xFF;

/// Configuration for the simulated bridge
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// I2C address the bridge answers on
    pub address: u8,
    /// Single-byte commands that are executed but then NAKed
    pub nak_opcodes: Vec<u8>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            address: SERDB_I2C_ADDR,
            // The real bridge drops off the bus as soon as it sees exit
            nak_opcodes: vec![CMD_EXIT],
        }
    }
}

/// Where an access frame landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// XDATA address
    Xdata(u16),
    /// DRAM address, window byte included
    Dram(u32),
    /// PM RIU byte address
    PmRiu(u16),
    /// Non-PM RIU byte address
    NonPmRiu(u16),
    /// Nothing behind it
    Unmapped,
}

/// One entry of the transaction log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// Magic received
    Magic,
    /// Single-byte command
    Command(u8),
    /// Bus access frame with its decoded target
    Access {
        /// Selected channel code
        channel: u8,
        /// Address as sent on the wire
        addr: u32,
        /// Data byte for writes
        data: Option<u8>,
        /// Where it went
        target: Target,
    },
    /// One-byte read and the value returned
    Read(u8),
}

type ReadHook = Box<dyn FnMut(u8) -> u8 + Send>;

/// Simulated SERDB bridge
pub struct SimBus {
    config: SimConfig,
    xdata: Vec<u8>,
    dram: Vec<u8>,
    pm_riu: Vec<u8>,
    nonpm_riu: Vec<u8>,
    channel: u8,
    window_armed: bool,
    latched: Target,
    active: bool,
    access_enabled: bool,
    mcu_running: bool,
    connected: bool,
    closed: bool,
    log: Vec<SimEvent>,
    hooks: HashMap<u16, ReadHook>,
}

impl SimBus {
    /// Create a simulated bridge with the given configuration
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            xdata: vec![0; XDATA_SIZE],
            dram: vec![0; DRAM_SIZE],
            pm_riu: vec![0; RIU_SIZE],
            nonpm_riu: vec![0; RIU_SIZE],
            channel: 0,
            window_armed: false,
            latched: Target::Unmapped,
            active: false,
            access_enabled: false,
            mcu_running: true,
            connected: true,
            closed: false,
            log: Vec::new(),
            hooks: HashMap::new(),
        }
    }

    /// Create a simulated bridge with the default configuration
    pub fn new_default() -> Self {
        Self::new(SimConfig::default())
    }

    /// XDATA contents
    pub fn xdata(&self) -> &[u8] {
        &self.xdata
    }

    /// Mutable XDATA contents
    pub fn xdata_mut(&mut self) -> &mut [u8] {
        &mut self.xdata
    }

    /// DRAM contents
    pub fn dram(&self) -> &[u8] {
        &self.dram
    }

    /// Mutable DRAM contents
    pub fn dram_mut(&mut self) -> &mut [u8] {
        &mut self.dram
    }

    /// RIU contents
    pub fn riu(&self, pm: bool) -> &[u8] {
        if pm {
            &self.pm_riu
        } else {
            &self.nonpm_riu
        }
    }

    /// Transaction log since creation or the last [`clear_log`](Self::clear_log)
    pub fn log(&self) -> &[SimEvent] {
        &self.log
    }

    /// Drop the transaction log
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// DRAM accesses from the log, as `(window, address)`
    pub fn dram_accesses(&self) -> Vec<(u8, u32)> {
        self.log
            .iter()
            .filter_map(|ev| match ev {
                SimEvent::Access {
                    target: Target::Dram(addr),
                    ..
                } => Some(((addr >> 16) as u8, *addr)),
                _ => None,
            })
            .collect()
    }

    /// Currently selected channel code
    pub fn channel_code(&self) -> u8 {
        self.channel
    }

    /// True while the 8051 is not stopped
    pub fn mcu_running(&self) -> bool {
        self.mcu_running
    }

    /// True between magic and exit
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True once the transport was closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Make every following transaction fail as if the adapter was unplugged
    pub fn disconnect(&mut self) {
        log::debug!("sim: disconnected");
        self.connected = false;
    }

    /// Undo [`disconnect`](Self::disconnect)
    ///
    /// Bridge state is lost, a new handshake is needed.
    pub fn reconnect(&mut self) {
        self.connected = true;
        self.active = false;
        self.access_enabled = false;
        self.window_armed = false;
    }

    /// Compute XDATA reads at `addr` with `hook`
    ///
    /// The hook gets the stored byte and returns the value to hand out,
    /// which is also stored. Used to script firmware behaviour such as a
    /// mailbox going READY.
    pub fn on_xdata_read(&mut self, addr: u16, hook: impl FnMut(u8) -> u8 + Send + 'static) {
        self.hooks.insert(addr, Box::new(hook));
    }

    fn check_link(&self, addr: u8) -> BusResult<()> {
        if !self.connected || self.closed {
            return Err(BusError::Disconnected);
        }
        if addr != self.config.address {
            return Err(BusError::Nak { addr });
        }
        Ok(())
    }

    fn handle_command(&mut self, addr: u8, op: u8) -> BusResult<()> {
        self.log.push(SimEvent::Command(op));
        if let Some(code) = apply_select_opcode(self.channel, op) {
            self.channel = code;
            self.window_armed = false;
        } else {
            match op {
                CMD_ENABLE_ACCESS => self.access_enabled = true,
                CMD_DISABLE_ACCESS => self.access_enabled = false,
                CMD_STOP_MCU => self.mcu_running = false,
                CMD_RESUME_MCU => self.mcu_running = true,
                CMD_EXIT => {
                    self.active = false;
                    self.access_enabled = false;
                }
                // 0x51, 0x53, 0x71 and 0x7F have no visible effect here
                _ => {}
            }
        }
        if self.config.nak_opcodes.contains(&op) {
            return Err(BusError::Nak { addr });
        }
        Ok(())
    }

    fn route(&mut self, frame: &BusAccessFrame) -> Target {
        match Channel::from_code(self.channel) {
            Some(Channel::Xdata) => {
                if self.window_armed {
                    self.window_armed = false;
                    let window = self.xdata[DRAM_WINDOW_REG as usize] as u32;
                    return Target::Dram(window << 16 | (frame.addr & 0xFFFF));
                }
                if frame.addr as usize >= XDATA_SIZE {
                    return Target::Unmapped;
                }
                if frame.addr == DRAM_WINDOW_REG as u32 && frame.data.is_some() {
                    self.window_armed = true;
                }
                Target::Xdata(frame.addr as u16)
            }
            Some(Channel::PmRiu) if (frame.addr as usize) < RIU_SIZE => {
                Target::PmRiu(frame.addr as u16)
            }
            Some(Channel::NonPmRiu) if (frame.addr as usize) < RIU_SIZE => {
                Target::NonPmRiu(frame.addr as u16)
            }
            _ => Target::Unmapped,
        }
    }

    fn store(&mut self, target: Target, value: u8) {
        match target {
            Target::Xdata(a) => self.xdata[a as usize] = value,
            Target::Dram(a) => self.dram[a as usize] = value,
            Target::PmRiu(a) => self.pm_riu[a as usize] = value,
            Target::NonPmRiu(a) => self.nonpm_riu[a as usize] = value,
            Target::Unmapped => {}
        }
    }

    fn load(&mut self, target: Target) -> u8 {
        match target {
            Target::Xdata(a) => {
                let stored = self.xdata[a as usize];
                match self.hooks.get_mut(&a) {
                    Some(hook) => {
                        let value = hook(stored);
                        self.xdata[a as usize] = value;
                        value
                    }
                    None => stored,
                }
            }
            Target::Dram(a) => self.dram[a as usize],
            Target::PmRiu(a) => self.pm_riu[a as usize],
            Target::NonPmRiu(a) => self.nonpm_riu[a as usize],
            Target::Unmapped => OPEN_BUS,
        }
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new_default()
    }
}

impl I2cBus for SimBus {
    fn write_bytes(&mut self, addr: u8, data: &[u8]) -> BusResult<()> {
        self.check_link(addr)?;

        if data == SERDB_MAGIC {
            self.log.push(SimEvent::Magic);
            self.active = true;
            self.window_armed = false;
            return Ok(());
        }
        if !self.active {
            // Not in debug mode, the target ignores us
            return Err(BusError::Nak { addr });
        }

        match data {
            [op] => self.handle_command(addr, *op),
            _ => {
                let frame = BusAccessFrame::decode(data).ok_or(BusError::Nak { addr })?;
                if !self.access_enabled {
                    return Err(BusError::Nak { addr });
                }
                let target = self.route(&frame);
                self.log.push(SimEvent::Access {
                    channel: self.channel,
                    addr: frame.addr,
                    data: frame.data,
                    target,
                });
                if let Some(value) = frame.data {
                    self.store(target, value);
                }
                self.latched = target;
                Ok(())
            }
        }
    }

    fn read_byte(&mut self, addr: u8) -> BusResult<u8> {
        self.check_link(addr)?;
        if !self.active || !self.access_enabled {
            return Err(BusError::Nak { addr });
        }
        let value = self.load(self.latched);
        self.log.push(SimEvent::Read(value));
        Ok(value)
    }

    fn close(&mut self) -> BusResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serdb_core::mailbox::{Mailbox, MailboxReply, ADDR_RESP, ADDR_STATUS};
    use serdb_core::protocol::CMD_BUS_ACCESS;
    use serdb_core::session::{Session, SessionConfig, SessionState};
    use serdb_core::target::{Aeon, AEON_CTRL};
    use serdb_core::Error;
    use std::sync::atomic::AtomicBool;
    use std::time::{Duration, Instant};

    fn config() -> SessionConfig {
        SessionConfig::default().with_delay(Duration::ZERO)
    }

    fn open() -> Session<SimBus> {
        Session::open(SimBus::new_default(), config()).unwrap()
    }

    #[test]
    fn test_xdata_round_trip() {
        let mut session = open();
        session.write_xdata(0x4401, 0x10).unwrap();
        assert_eq!(session.read_xdata(0x4401).unwrap(), 0x10);
        assert_eq!(session.bus().xdata()[0x4401], 0x10);
    }

    #[test]
    fn test_dram_round_trip() {
        let mut session = open();
        session.write_dram(0x100000, 0xAB).unwrap();
        session.write_dram(0x100001, 0xCD).unwrap();
        assert_eq!(session.read_dram_range(0x100000, 2).unwrap(), vec![0xAB, 0xCD]);
        assert_eq!(&session.bus().dram()[0x100000..0x100002], &[0xAB, 0xCD]);
    }

    #[test]
    fn test_window_precedes_dram_access() {
        let mut session = open();
        session.bus_mut().clear_log();
        session.read_dram(0x123456).unwrap();

        let log = session.bus().log();
        let pos = log
            .iter()
            .position(|ev| {
                matches!(
                    ev,
                    SimEvent::Access {
                        target: Target::Dram(0x123456),
                        ..
                    }
                )
            })
            .unwrap();
        assert_eq!(
            log[pos - 1],
            SimEvent::Access {
                channel: 0,
                addr: 0,
                data: Some(0x12),
                target: Target::Xdata(0),
            }
        );
        assert_eq!(session.bus().dram_accesses(), vec![(0x12, 0x123456)]);
    }

    #[test]
    fn test_xdata_after_dram_is_not_redirected() {
        let mut session = open();
        session.write_dram(0x124401, 0x55).unwrap();
        session.write_xdata(0x4401, 0x66).unwrap();
        assert_eq!(session.bus().dram()[0x124401], 0x55);
        assert_eq!(session.bus().xdata()[0x4401], 0x66);
    }

    #[test]
    fn test_window_rewritten_every_access() {
        let mut session = open();
        session.write_dram_range(0x0C0000, &[1, 2, 3]).unwrap();
        let windows = session
            .bus()
            .log()
            .iter()
            .filter(|ev| {
                matches!(
                    ev,
                    SimEvent::Access {
                        target: Target::Xdata(0),
                        data: Some(0x0C),
                        ..
                    }
                )
            })
            .count();
        assert_eq!(windows, 3);
    }

    #[test]
    fn test_riu_on_both_channels() {
        let mut session = open();
        session.write_riu(0x10, 0x02, 0x1234, true).unwrap();
        session.write_riu(0x10, 0x02, 0xABCD, false).unwrap();
        assert_eq!(&session.bus().riu(true)[0x1002..0x1004], &[0x34, 0x12]);
        assert_eq!(session.read_riu(0x10, 0x02, false).unwrap(), 0xABCD);
        assert_eq!(session.read_riu(0x10, 0x02, true).unwrap(), 0x1234);
    }

    #[test]
    fn test_channel_switch_elided() {
        let mut session = open();
        session.read_riu(0x1E, 0x00, false).unwrap();
        session.bus_mut().clear_log();
        session.read_riu(0x1E, 0x02, false).unwrap();
        assert!(!session
            .bus()
            .log()
            .iter()
            .any(|ev| matches!(ev, SimEvent::Command(_))));
        assert_eq!(session.bus().channel_code(), 4);
    }

    #[test]
    fn test_close_exit_nak_tolerated() {
        let mut session = open();
        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.bus().is_closed());
        assert!(!session.bus().is_active());
        assert!(matches!(session.read_xdata(0x4401), Err(Error::Closed)));
        assert!(matches!(session.read_dram(0), Err(Error::Closed)));
    }

    #[test]
    fn test_probe_after_disconnect() {
        let mut session = open();
        assert!(session.probe());
        session.bus_mut().disconnect();
        assert!(!session.probe());
        assert!(matches!(
            session.read_xdata(0),
            Err(Error::Bus(BusError::Disconnected))
        ));
    }

    #[test]
    fn test_reinit_after_reconnect() {
        let mut session = open();
        session.bus_mut().disconnect();
        session.bus_mut().reconnect();
        // Bridge forgot the handshake
        assert!(session.read_xdata(0x10).is_err());
        session.reinit().unwrap();
        assert_eq!(session.read_xdata(0x10).unwrap(), 0);
    }

    #[test]
    fn test_wrong_address_naks() {
        let result = Session::open(SimBus::new_default(), config().with_address(0x50));
        assert!(matches!(
            result,
            Err(Error::Bus(BusError::Nak { addr: 0x50 }))
        ));
    }

    #[test]
    fn test_access_before_handshake_naks() {
        let mut sim = SimBus::new_default();
        assert!(sim
            .write_bytes(SERDB_I2C_ADDR, &[CMD_BUS_ACCESS, 0, 0, 0x44, 0x01])
            .is_err());
        assert!(sim.log().is_empty());
    }

    #[test]
    fn test_mcu_stop_resume() {
        let mut session = open();
        session.stop_mcu().unwrap();
        assert!(!session.bus().mcu_running());
        session.resume_mcu().unwrap();
        assert!(session.bus().mcu_running());
    }

    #[test]
    fn test_mailbox_reply_after_polls() {
        let mut sim = SimBus::new_default();
        sim.xdata_mut()[ADDR_RESP as usize..ADDR_RESP as usize + 4]
            .copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        let mut polls = 0;
        sim.on_xdata_read(ADDR_STATUS, move |_| {
            polls += 1;
            if polls >= 3 {
                0xFE
            } else {
                0x00
            }
        });

        let mut session = Session::open(sim, config()).unwrap();
        let reply = Mailbox::new(&mut session)
            .with_poll_interval(Duration::from_millis(1))
            .send_command(0x10, &[0x00, 0x10, 0x00, 0x00], true, Duration::from_secs(1))
            .unwrap();
        assert_eq!(reply, MailboxReply::Response([0x01, 0x02, 0x03, 0x04]));

        let xdata = session.bus().xdata();
        assert_eq!(xdata[0x4401], 0x10);
        assert_eq!(&xdata[0x4402..0x4406], &[0x00, 0x10, 0x00, 0x00]);
        assert_eq!(&xdata[0x4417..0x441B], &[0xFF; 4]);
    }

    #[test]
    fn test_mailbox_timeout() {
        let mut session = open();
        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        let reply = Mailbox::new(&mut session)
            .send_command(0x01, &[], true, timeout)
            .unwrap();
        let elapsed = start.elapsed();
        assert_eq!(reply, MailboxReply::NoResponse);
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(100));
    }

    #[test]
    fn test_aeon_over_session() {
        let mut session = open();
        session.write_xdata(AEON_CTRL, 0x07).unwrap();
        assert!(Aeon::new(&mut session).halt().unwrap());
        assert_eq!(session.bus().xdata()[AEON_CTRL as usize], 0x06);
    }

    #[test]
    fn test_search_overlapping() {
        let mut session = open();
        session
            .bus_mut()
            .dram_mut()[0x100000..0x100006]
            .copy_from_slice(&[0xAA, 0xAA, 0xAA, 0x00, 0xAA, 0xAA]);
        let running = AtomicBool::new(true);
        let found = session
            .search_dram(0x100000, 0x100010, &[0xAA, 0xAA], &running, |_| {})
            .unwrap();
        assert_eq!(found.into_inner(), vec![0x100000, 0x100001, 0x100004]);
    }

    #[test]
    fn test_compare() {
        let mut session = open();
        session.bus_mut().dram_mut()[0x0C0000..0x0C0004].copy_from_slice(&[1, 2, 3, 4]);
        session.bus_mut().dram_mut()[0x150000..0x150004].copy_from_slice(&[1, 9, 3, 8]);
        let running = AtomicBool::new(true);
        let diffs = session
            .compare_dram(0x0C0000, 0x150000, 4, &running, |_| {})
            .unwrap()
            .into_inner();
        assert_eq!(diffs.len(), 2);
        assert_eq!((diffs[0].offset, diffs[0].first, diffs[0].second), (1, 2, 9));
        assert_eq!((diffs[1].offset, diffs[1].first, diffs[1].second), (3, 4, 8));
    }
}
