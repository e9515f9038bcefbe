//! Wrappers for target-side control registers in XDATA
//!
//! These only use [`XdataAccess`], so they work over a live session, a
//! borrowed session or any test double.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bitflags::bitflags;

use crate::error::Result;
use crate::mailbox::{Mailbox, MailboxSnapshot};
use crate::space::XdataAccess;

/// AEON control register
pub const AEON_CTRL: u16 = 0x0FE6;

/// Watchdog state register
pub const WDT_STATE: u16 = 0x44CE;
/// Watchdog counter, low byte
pub const WDT_COUNTER_LO: u16 = 0x44D3;
/// Watchdog counter, high byte
pub const WDT_COUNTER_HI: u16 = 0x44D4;
/// Counter value above which the watchdog is about to fire
pub const WDT_THRESHOLD: u16 = 0xEA00;

/// Primary state machine, two bytes
pub const STATE_PRIMARY: u16 = 0x4800;
/// Secondary state byte
pub const STATE_SECONDARY: u16 = 0x4185;
/// Decoder state byte
pub const STATE_DECODE: u16 = 0x4A9D;
/// Storage state byte
pub const STATE_STORAGE: u16 = 0x4100;

/// GWin primary window
pub const GWIN_PRIMARY: u16 = 0x6EA8;
/// GWin secondary window
pub const GWIN_SECONDARY: u16 = 0x6FA8;
/// GWin enable
pub const GWIN_ENABLE: u16 = 0x6EE0;

/// Default pause between the steps of [`Aeon::reset`]
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_millis(100);

bitflags! {
    /// AEON control register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AeonCtrl: u8 {
        /// Core is running
        const RUN     = 1 << 0;
        /// Core is enabled
        const ENABLE  = 1 << 1;
        /// Reset released
        const RESET_N = 1 << 2;
    }
}

/// Coarse AEON state derived from the control bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AeonState {
    /// Enabled, out of reset and running
    Running,
    /// Enabled and out of reset, but halted
    Halted,
    /// Enabled, held in reset
    InReset,
    /// Not enabled
    Disabled,
}

impl AeonCtrl {
    /// Coarse state for display
    pub fn state(self) -> AeonState {
        let live = AeonCtrl::ENABLE | AeonCtrl::RESET_N;
        if self.contains(live | AeonCtrl::RUN) {
            AeonState::Running
        } else if self.contains(live) {
            AeonState::Halted
        } else if self.contains(AeonCtrl::ENABLE) {
            AeonState::InReset
        } else {
            AeonState::Disabled
        }
    }
}

impl std::fmt::Display for AeonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AeonState::Running => write!(f, "RUNNING"),
            AeonState::Halted => write!(f, "ENABLED but HALTED"),
            AeonState::InReset => write!(f, "IN RESET"),
            AeonState::Disabled => write!(f, "DISABLED"),
        }
    }
}

/// AEON coprocessor control
pub struct Aeon<X: XdataAccess> {
    xdata: X,
}

impl<X: XdataAccess> Aeon<X> {
    /// Wrap an XDATA accessor
    pub fn new(xdata: X) -> Self {
        Self { xdata }
    }

    /// Read the control register
    pub fn read_ctrl(&mut self) -> Result<AeonCtrl> {
        Ok(AeonCtrl::from_bits_retain(self.xdata.read_xdata(AEON_CTRL)?))
    }

    fn write_ctrl(&mut self, ctrl: AeonCtrl) -> Result<()> {
        self.xdata.write_xdata(AEON_CTRL, ctrl.bits())
    }

    /// True if RUN is set
    pub fn is_running(&mut self) -> Result<bool> {
        Ok(self.read_ctrl()?.contains(AeonCtrl::RUN))
    }

    /// Clear RUN, leaving the other bits alone
    ///
    /// Returns true if the core reads back as halted.
    pub fn halt(&mut self) -> Result<bool> {
        let ctrl = self.read_ctrl()?;
        self.write_ctrl(ctrl - AeonCtrl::RUN)?;
        Ok(!self.is_running()?)
    }

    /// Set RUN, leaving the other bits alone
    ///
    /// Returns true if the core reads back as running.
    pub fn resume(&mut self) -> Result<bool> {
        let ctrl = self.read_ctrl()?;
        self.write_ctrl(ctrl | AeonCtrl::RUN)?;
        self.is_running()
    }

    /// Enable and release reset without running
    pub fn enable(&mut self) -> Result<()> {
        self.write_ctrl(AeonCtrl::ENABLE | AeonCtrl::RESET_N)
    }

    /// Disable and hold in reset
    pub fn disable(&mut self) -> Result<()> {
        self.write_ctrl(AeonCtrl::empty())
    }

    /// Halt, disable, enable, resume with `delay` between steps
    pub fn reset(&mut self, delay: Duration) -> Result<bool> {
        log::info!("aeon: halting");
        self.halt()?;
        std::thread::sleep(delay);
        log::info!("aeon: disabling");
        self.disable()?;
        std::thread::sleep(delay);
        log::info!("aeon: enabling");
        self.enable()?;
        std::thread::sleep(delay);
        log::info!("aeon: resuming");
        self.resume()
    }
}

/// Watchdog register contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WatchdogStatus {
    /// Raw state register
    pub state: u8,
    /// Bit 0 of the state register
    pub enabled: bool,
    /// 16-bit counter
    pub counter: u16,
}

impl WatchdogStatus {
    /// Enabled and counter past [`WDT_THRESHOLD`]
    pub fn near_reset(&self) -> bool {
        self.enabled && self.counter > WDT_THRESHOLD
    }
}

/// Software watchdog control
pub struct Watchdog<X: XdataAccess> {
    xdata: X,
}

impl<X: XdataAccess> Watchdog<X> {
    const ENABLE: u8 = 0x01;

    /// Wrap an XDATA accessor
    pub fn new(xdata: X) -> Self {
        Self { xdata }
    }

    /// Read the state register
    pub fn read_state(&mut self) -> Result<u8> {
        self.xdata.read_xdata(WDT_STATE)
    }

    /// Read the counter, low byte first
    pub fn read_counter(&mut self) -> Result<u16> {
        let low = self.xdata.read_xdata(WDT_COUNTER_LO)?;
        let high = self.xdata.read_xdata(WDT_COUNTER_HI)?;
        Ok(u16::from_le_bytes([low, high]))
    }

    /// Write the counter, low byte first
    pub fn write_counter(&mut self, value: u16) -> Result<()> {
        let [low, high] = value.to_le_bytes();
        self.xdata.write_xdata(WDT_COUNTER_LO, low)?;
        self.xdata.write_xdata(WDT_COUNTER_HI, high)
    }

    /// True if the enable bit is set
    pub fn is_enabled(&mut self) -> Result<bool> {
        Ok(self.read_state()? & Self::ENABLE != 0)
    }

    /// Read state and counter
    pub fn status(&mut self) -> Result<WatchdogStatus> {
        let state = self.read_state()?;
        let counter = self.read_counter()?;
        Ok(WatchdogStatus {
            state,
            enabled: state & Self::ENABLE != 0,
            counter,
        })
    }

    /// Set the enable bit. Returns true if it reads back set.
    pub fn enable(&mut self) -> Result<bool> {
        let state = self.read_state()?;
        self.xdata.write_xdata(WDT_STATE, state | Self::ENABLE)?;
        self.is_enabled()
    }

    /// Clear the enable bit and zero the counter
    ///
    /// Returns true if the enable bit reads back clear.
    pub fn disable(&mut self) -> Result<bool> {
        let state = self.read_state()?;
        self.xdata.write_xdata(WDT_STATE, state & !Self::ENABLE)?;
        self.write_counter(0)?;
        Ok(!self.is_enabled()?)
    }

    /// Reload the counter
    pub fn feed(&mut self, value: u16) -> Result<()> {
        self.write_counter(value)
    }

    /// Report the status every `interval` until `running` is cleared
    pub fn watch(
        &mut self,
        interval: Duration,
        running: &AtomicBool,
        mut on_sample: impl FnMut(&WatchdogStatus),
    ) -> Result<()> {
        while running.load(Ordering::SeqCst) {
            on_sample(&self.status()?);
            std::thread::sleep(interval);
        }
        Ok(())
    }
}

/// A named region of shared DRAM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DramRegion {
    /// Short name used on the command line
    pub name: &'static str,
    /// First byte
    pub start: u32,
    /// Length in bytes
    pub len: u32,
    /// What the firmware keeps there
    pub description: &'static str,
}

/// Known DRAM buffers
pub const DRAM_REGIONS: &[DramRegion] = &[
    DramRegion {
        name: "secondary",
        start: 0x0C_0000,
        len: 0x4_0000,
        description: "Secondary buffer",
    },
    DramRegion {
        name: "main",
        start: 0x10_0000,
        len: 0x8_0000,
        description: "Main decode buffer",
    },
    DramRegion {
        name: "output",
        start: 0x15_0000,
        len: 0x6_0000,
        description: "Output buffer",
    },
];

/// Look up a DRAM region by name
pub fn dram_region(name: &str) -> Option<&'static DramRegion> {
    DRAM_REGIONS.iter().find(|r| r.name.eq_ignore_ascii_case(name))
}

/// A named region of XDATA
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XdataRegion {
    /// Short name used on the command line
    pub name: &'static str,
    /// First byte
    pub start: u16,
    /// Length in bytes
    pub len: u16,
    /// What the firmware keeps there
    pub description: &'static str,
}

/// Known XDATA regions
pub const XDATA_REGIONS: &[XdataRegion] = &[
    XdataRegion {
        name: "system",
        start: 0x0100,
        len: 0x0F00,
        description: "System area",
    },
    XdataRegion {
        name: "riu",
        start: 0x1000,
        len: 0x1000,
        description: "RIU access window",
    },
    XdataRegion {
        name: "mailbox",
        start: 0x4000,
        len: 0x0500,
        description: "Mailbox/state variables",
    },
    XdataRegion {
        name: "state",
        start: 0x4800,
        len: 0x0300,
        description: "Primary state machine",
    },
    XdataRegion {
        name: "gwin",
        start: 0x6E00,
        len: 0x0200,
        description: "GWin display control",
    },
    XdataRegion {
        name: "extended",
        start: 0x5000,
        len: 0x1000,
        description: "Extended state",
    },
];

/// Look up an XDATA region by name
pub fn xdata_region(name: &str) -> Option<&'static XdataRegion> {
    XDATA_REGIONS.iter().find(|r| r.name.eq_ignore_ascii_case(name))
}

/// Firmware variables worth looking at first
pub const KEY_VARIABLES: &[(u16, &str)] = &[
    (0x4401, "Mailbox Command"),
    (0x4402, "Mailbox Param[0]"),
    (0x4417, "Mailbox Sync"),
    (0x40FB, "Mailbox Status"),
    (0x40FC, "Mailbox Response[0]"),
    (0x40FD, "Mailbox Response[1]"),
    (0x40FE, "Mailbox Response[2]"),
    (0x40FF, "Mailbox Response[3]"),
    (AEON_CTRL, "AEON Control"),
    (WDT_STATE, "Watchdog State"),
    (WDT_COUNTER_LO, "Watchdog Counter Lo"),
    (WDT_COUNTER_HI, "Watchdog Counter Hi"),
    (STATE_PRIMARY, "Primary State[0]"),
    (STATE_PRIMARY + 1, "Primary State[1]"),
    (STATE_SECONDARY, "Secondary State"),
    (STATE_DECODE, "Decode State"),
    (STATE_STORAGE, "Storage State"),
    (GWIN_PRIMARY, "GWin Primary"),
    (GWIN_SECONDARY, "GWin Secondary"),
    (GWIN_ENABLE, "GWin Enable"),
];

/// Read every entry of [`KEY_VARIABLES`]
pub fn read_key_variables<X: XdataAccess>(
    mut xdata: X,
) -> Result<Vec<(u16, &'static str, u8)>> {
    KEY_VARIABLES
        .iter()
        .map(|&(addr, name)| Ok((addr, name, xdata.read_xdata(addr)?)))
        .collect()
}

/// Firmware state machine bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FirmwareState {
    /// Primary state, both bytes in address order
    pub primary: [u8; 2],
    /// Secondary state
    pub secondary: u8,
    /// Decoder state
    pub decode: u8,
    /// Storage state
    pub storage: u8,
}

/// GWin display control bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GwinState {
    /// Primary window
    pub primary: u8,
    /// Secondary window
    pub secondary: u8,
    /// Enable
    pub enable: u8,
}

/// AEON, watchdog, mailbox, firmware state and GWin in one read
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StateSnapshot {
    /// Raw AEON control register
    pub aeon_ctrl: u8,
    /// Decoded AEON state
    pub aeon: AeonState,
    /// Watchdog registers
    pub watchdog: WatchdogStatus,
    /// Mailbox registers
    pub mailbox: MailboxSnapshot,
    /// Firmware state machine
    pub state: FirmwareState,
    /// GWin display control
    pub gwin: GwinState,
}

/// One field that differs between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// Dotted field name, e.g. `watchdog.counter`
    pub field: &'static str,
    /// Previous value
    pub old: u32,
    /// Current value
    pub new: u32,
}

impl StateSnapshot {
    /// Read everything through `xdata`
    pub fn capture<X: XdataAccess>(mut xdata: X) -> Result<Self> {
        let ctrl = Aeon::new(&mut xdata).read_ctrl()?;
        let watchdog = Watchdog::new(&mut xdata).status()?;
        let mailbox = Mailbox::new(&mut xdata).snapshot()?;
        let state = FirmwareState {
            primary: [
                xdata.read_xdata(STATE_PRIMARY)?,
                xdata.read_xdata(STATE_PRIMARY + 1)?,
            ],
            secondary: xdata.read_xdata(STATE_SECONDARY)?,
            decode: xdata.read_xdata(STATE_DECODE)?,
            storage: xdata.read_xdata(STATE_STORAGE)?,
        };
        let gwin = GwinState {
            primary: xdata.read_xdata(GWIN_PRIMARY)?,
            secondary: xdata.read_xdata(GWIN_SECONDARY)?,
            enable: xdata.read_xdata(GWIN_ENABLE)?,
        };
        Ok(Self {
            aeon_ctrl: ctrl.bits(),
            aeon: ctrl.state(),
            watchdog,
            mailbox,
            state,
            gwin,
        })
    }

    /// Every scalar field with its dotted name
    fn fields(&self) -> [(&'static str, u32); 18] {
        let mb = &self.mailbox;
        [
            ("aeon.register", self.aeon_ctrl as u32),
            ("watchdog.state", self.watchdog.state as u32),
            ("watchdog.counter", self.watchdog.counter as u32),
            ("mailbox.command", mb.command as u32),
            ("mailbox.param0", mb.params[0] as u32),
            ("mailbox.sync", mb.sync as u32),
            ("mailbox.status", mb.status.as_byte() as u32),
            ("mailbox.response0", mb.response[0] as u32),
            ("mailbox.response1", mb.response[1] as u32),
            ("mailbox.response2", mb.response[2] as u32),
            ("mailbox.response3", mb.response[3] as u32),
            ("state.primary", u16::from_be_bytes(self.state.primary) as u32),
            ("state.secondary", self.state.secondary as u32),
            ("state.decode", self.state.decode as u32),
            ("state.storage", self.state.storage as u32),
            ("gwin.primary", self.gwin.primary as u32),
            ("gwin.secondary", self.gwin.secondary as u32),
            ("gwin.enable", self.gwin.enable as u32),
        ]
    }

    /// Fields that differ from `previous`, in display order
    pub fn changes_since(&self, previous: &StateSnapshot) -> Vec<StateChange> {
        previous
            .fields()
            .into_iter()
            .zip(self.fields())
            .filter(|((_, old), (_, new))| old != new)
            .map(|((field, old), (_, new))| StateChange { field, old, new })
            .collect()
    }
}

/// Capture a snapshot every `interval` until `running` is cleared
///
/// `on_sample` gets each snapshot with its changes since the previous one.
/// The first sample has no changes.
pub fn watch_state<X: XdataAccess>(
    mut xdata: X,
    interval: Duration,
    running: &AtomicBool,
    mut on_sample: impl FnMut(&StateSnapshot, &[StateChange]),
) -> Result<()> {
    let mut last: Option<StateSnapshot> = None;
    while running.load(Ordering::SeqCst) {
        let snap = StateSnapshot::capture(&mut xdata)?;
        let changes = last
            .as_ref()
            .map(|prev| snap.changes_since(prev))
            .unwrap_or_default();
        on_sample(&snap, &changes);
        last = Some(snap);
        std::thread::sleep(interval);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::MailboxStatus;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapXdata(HashMap<u16, u8>);

    impl XdataAccess for MapXdata {
        fn read_xdata(&mut self, addr: u16) -> Result<u8> {
            Ok(self.0.get(&addr).copied().unwrap_or(0))
        }

        fn write_xdata(&mut self, addr: u16, value: u8) -> Result<()> {
            self.0.insert(addr, value);
            Ok(())
        }
    }

    #[test]
    fn test_aeon_halt_preserves_bits() {
        let mut xdata = MapXdata::default();
        xdata.0.insert(AEON_CTRL, 0x07 | 0x80);
        let mut aeon = Aeon::new(&mut xdata);
        assert!(aeon.halt().unwrap());
        assert_eq!(xdata.0[&AEON_CTRL], 0x86);
    }

    #[test]
    fn test_aeon_reset_cycle() {
        let mut xdata = MapXdata::default();
        xdata.0.insert(AEON_CTRL, 0x07);
        let mut aeon = Aeon::new(&mut xdata);
        assert!(aeon.reset(Duration::ZERO).unwrap());
        assert_eq!(aeon.read_ctrl().unwrap().state(), AeonState::Running);
    }

    #[test]
    fn test_aeon_state() {
        assert_eq!(AeonCtrl::from_bits_retain(0x07).state(), AeonState::Running);
        assert_eq!(AeonCtrl::from_bits_retain(0x06).state(), AeonState::Halted);
        assert_eq!(AeonCtrl::from_bits_retain(0x02).state(), AeonState::InReset);
        assert_eq!(AeonCtrl::from_bits_retain(0x01).state(), AeonState::Disabled);
    }

    #[test]
    fn test_watchdog_disable_zeroes_counter() {
        let mut xdata = MapXdata::default();
        xdata.0.insert(WDT_STATE, 0x81);
        xdata.0.insert(WDT_COUNTER_LO, 0x34);
        xdata.0.insert(WDT_COUNTER_HI, 0x12);
        let mut wdt = Watchdog::new(&mut xdata);
        assert_eq!(wdt.read_counter().unwrap(), 0x1234);
        assert!(wdt.disable().unwrap());
        let status = wdt.status().unwrap();
        assert_eq!(status.state, 0x80);
        assert_eq!(status.counter, 0);
        assert!(!status.enabled);
    }

    #[test]
    fn test_watchdog_near_reset() {
        let mut xdata = MapXdata::default();
        let mut wdt = Watchdog::new(&mut xdata);
        assert!(wdt.enable().unwrap());
        wdt.feed(0xEA01).unwrap();
        assert!(wdt.status().unwrap().near_reset());
        wdt.feed(0xEA00).unwrap();
        assert!(!wdt.status().unwrap().near_reset());
    }

    #[test]
    fn test_dram_region_lookup() {
        let main = dram_region("MAIN").unwrap();
        assert_eq!((main.start, main.len), (0x100000, 0x80000));
        assert!(dram_region("framebuffer").is_none());
    }

    #[test]
    fn test_state_snapshot() {
        let mut xdata = MapXdata::default();
        xdata.0.insert(AEON_CTRL, 0x06);
        xdata.0.insert(WDT_STATE, 0x01);
        xdata.0.insert(0x40FB, 0xFE);
        let snap = StateSnapshot::capture(&mut xdata).unwrap();
        assert_eq!(snap.aeon, AeonState::Halted);
        assert!(snap.watchdog.enabled);
        assert_eq!(snap.mailbox.status, MailboxStatus::Ready);
    }

    #[test]
    fn test_state_snapshot_firmware_and_gwin() {
        let mut xdata = MapXdata::default();
        xdata.0.insert(0x4800, 0x12);
        xdata.0.insert(0x4801, 0x34);
        xdata.0.insert(0x4185, 0x05);
        xdata.0.insert(0x4A9D, 0x06);
        xdata.0.insert(0x4100, 0x07);
        xdata.0.insert(0x6EA8, 0xA8);
        xdata.0.insert(0x6FA8, 0xB8);
        xdata.0.insert(0x6EE0, 0x01);
        let snap = StateSnapshot::capture(&mut xdata).unwrap();
        assert_eq!(
            snap.state,
            FirmwareState {
                primary: [0x12, 0x34],
                secondary: 0x05,
                decode: 0x06,
                storage: 0x07,
            }
        );
        assert_eq!(
            snap.gwin,
            GwinState {
                primary: 0xA8,
                secondary: 0xB8,
                enable: 0x01,
            }
        );
    }

    #[test]
    fn test_state_changes() {
        let mut xdata = MapXdata::default();
        let before = StateSnapshot::capture(&mut xdata).unwrap();
        assert!(before.changes_since(&before).is_empty());

        xdata.0.insert(WDT_COUNTER_LO, 0x10);
        xdata.0.insert(GWIN_ENABLE, 0x01);
        let after = StateSnapshot::capture(&mut xdata).unwrap();
        assert_eq!(
            after.changes_since(&before),
            vec![
                StateChange {
                    field: "watchdog.counter",
                    old: 0,
                    new: 0x10,
                },
                StateChange {
                    field: "gwin.enable",
                    old: 0,
                    new: 1,
                },
            ]
        );
    }

    /// XDATA whose watchdog counter ticks on every read and that clears
    /// `running` after a fixed number of counter reads
    struct TickingXdata<'a> {
        mem: MapXdata,
        ticks: u8,
        stop_after: u8,
        running: &'a AtomicBool,
    }

    impl XdataAccess for TickingXdata<'_> {
        fn read_xdata(&mut self, addr: u16) -> Result<u8> {
            if addr == WDT_COUNTER_LO {
                self.ticks += 1;
                if self.ticks >= self.stop_after {
                    self.running.store(false, Ordering::SeqCst);
                }
                return Ok(self.ticks);
            }
            self.mem.read_xdata(addr)
        }

        fn write_xdata(&mut self, addr: u16, value: u8) -> Result<()> {
            self.mem.write_xdata(addr, value)
        }
    }

    #[test]
    fn test_watchdog_watch_stops_on_flag() {
        let running = AtomicBool::new(true);
        let mut xdata = TickingXdata {
            mem: MapXdata::default(),
            ticks: 0,
            stop_after: 3,
            running: &running,
        };
        let mut counters = Vec::new();
        Watchdog::new(&mut xdata)
            .watch(Duration::ZERO, &running, |s| counters.push(s.counter))
            .unwrap();
        assert_eq!(counters, vec![1, 2, 3]);
    }

    #[test]
    fn test_watch_state_reports_changes() {
        let running = AtomicBool::new(true);
        let mut xdata = TickingXdata {
            mem: MapXdata::default(),
            ticks: 0,
            stop_after: 2,
            running: &running,
        };
        let mut seen = Vec::new();
        watch_state(&mut xdata, Duration::ZERO, &running, |snap, changes| {
            seen.push((snap.watchdog.counter, changes.to_vec()));
        })
        .unwrap();

        assert_eq!(seen.len(), 2);
        assert!(seen[0].1.is_empty());
        assert_eq!(
            seen[1].1,
            vec![StateChange {
                field: "watchdog.counter",
                old: 1,
                new: 2,
            }]
        );
    }

    #[test]
    fn test_watch_not_started_when_stopped() {
        let running = AtomicBool::new(false);
        let mut xdata = MapXdata::default();
        let mut calls = 0;
        watch_state(&mut xdata, Duration::ZERO, &running, |_, _| calls += 1).unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_xdata_tables() {
        let gwin = xdata_region("GWIN").unwrap();
        assert_eq!((gwin.start, gwin.len), (0x6E00, 0x0200));
        assert!(xdata_region("stack").is_none());
        for r in XDATA_REGIONS {
            assert!(r.start as u32 + r.len as u32 <= 0x1_0000, "{} overflows", r.name);
        }

        let mut xdata = MapXdata::default();
        xdata.0.insert(AEON_CTRL, 0x07);
        let vars = read_key_variables(&mut xdata).unwrap();
        assert_eq!(vars.len(), KEY_VARIABLES.len());
        assert!(vars.contains(&(AEON_CTRL, "AEON Control", 0x07)));
    }
}
