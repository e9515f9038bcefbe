//! SERDB wire protocol constants and frame encoding
//!
//! Every command is a plain I2C write to the bridge address. Register
//! accesses use the bus-access opcode followed by a 4-byte big-endian
//! address and, for writes, one data byte. Reads are a separate one-byte
//! I2C read after the address frame.

use heapless::Vec;

/// Default I2C address of the SERDB bridge
pub const SERDB_I2C_ADDR: u8 = 0x59;

/// Magic written at the start of a session
pub const SERDB_MAGIC: &[u8; 5] = b"SERDB";

// ============================================================================
// Opcodes
// ============================================================================

/// Bus access with 4-byte big-endian address
pub const CMD_BUS_ACCESS: u8 = 0x10;
/// Disable bus access
pub const CMD_DISABLE_ACCESS: u8 = 0x34;
/// Enable bus access
pub const CMD_ENABLE_ACCESS: u8 = 0x35;
/// Resume MCU
pub const CMD_RESUME_MCU: u8 = 0x36;
/// Stop MCU
pub const CMD_STOP_MCU: u8 = 0x37;
/// Exit SERDB, always NAKed by the bridge
pub const CMD_EXIT: u8 = 0x45;
/// Sent before stopping the MCU
pub const CMD_BEFORE_STOP: u8 = 0x51;
/// Sent when not stopping the MCU
pub const CMD_NOT_STOPPING: u8 = 0x53;
/// I2C reshape
pub const CMD_I2C_RESHAPE: u8 = 0x71;
/// Undocumented, part of the init sequence
pub const CMD_UNKNOWN_7F: u8 = 0x7F;

/// Channel select bit 0 clear
pub const CMD_CH_BIT0_CLR: u8 = 0x80;
/// Channel select bit 0 set
pub const CMD_CH_BIT0_SET: u8 = 0x81;
/// Channel select bit 1 clear
pub const CMD_CH_BIT1_CLR: u8 = 0x82;
/// Channel select bit 1 set
pub const CMD_CH_BIT1_SET: u8 = 0x83;
/// Channel select bit 2 clear
pub const CMD_CH_BIT2_CLR: u8 = 0x84;
/// Channel select bit 2 set
pub const CMD_CH_BIT2_SET: u8 = 0x85;

/// Sent after the magic and channel select to bring the bridge up
pub const INIT_SEQUENCE: [u8; 4] = [
    CMD_NOT_STOPPING,
    CMD_UNKNOWN_7F,
    CMD_ENABLE_ACCESS,
    CMD_I2C_RESHAPE,
];

/// XDATA address of the DRAM window (high address byte) register
pub const DRAM_WINDOW_REG: u16 = 0x0000;

/// Highest DRAM address reachable through the window
pub const DRAM_MAX_ADDR: u32 = 0x00FF_FFFF;

/// Highest XDATA address
pub const XDATA_MAX_ADDR: u32 = 0xFFFF;

/// Bridge sub-bus selected by the channel-select opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// 8051 XDATA (also carries the DRAM window)
    Xdata = 0,
    /// Power-managed RIU banks
    PmRiu = 3,
    /// Non-power-managed RIU banks
    NonPmRiu = 4,
}

impl Channel {
    /// 3-bit select code
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Map a select code back to a channel
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Channel::Xdata),
            3 => Some(Channel::PmRiu),
            4 => Some(Channel::NonPmRiu),
            _ => None,
        }
    }

    /// RIU channel for the power-managed or non-PM bank
    pub const fn riu(pm: bool) -> Self {
        if pm {
            Channel::PmRiu
        } else {
            Channel::NonPmRiu
        }
    }

    /// The three single-byte opcodes that select this channel, bit 0 first
    pub const fn select_opcodes(self) -> [u8; 3] {
        let code = self.code();
        [
            if code & 0x01 != 0 { CMD_CH_BIT0_SET } else { CMD_CH_BIT0_CLR },
            if code & 0x02 != 0 { CMD_CH_BIT1_SET } else { CMD_CH_BIT1_CLR },
            if code & 0x04 != 0 { CMD_CH_BIT2_SET } else { CMD_CH_BIT2_CLR },
        ]
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Channel::Xdata => write!(f, "XDATA"),
            Channel::PmRiu => write!(f, "PM RIU"),
            Channel::NonPmRiu => write!(f, "non-PM RIU"),
        }
    }
}

/// Apply one channel-select opcode to a 3-bit select code
///
/// Returns `None` if `opcode` is not a channel-select opcode.
pub fn apply_select_opcode(code: u8, opcode: u8) -> Option<u8> {
    if !(CMD_CH_BIT0_CLR..=CMD_CH_BIT2_SET).contains(&opcode) {
        return None;
    }
    let bit = 1 << ((opcode - CMD_CH_BIT0_CLR) / 2);
    if opcode & 0x01 != 0 {
        Some(code | bit)
    } else {
        Some(code & !bit)
    }
}

/// One bus-access transaction as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusAccessFrame {
    /// Target address (32 bits on the wire)
    pub addr: u32,
    /// Data byte for writes, `None` for reads
    pub data: Option<u8>,
}

impl BusAccessFrame {
    /// Frame that latches `addr` for a following read
    pub const fn read(addr: u32) -> Self {
        Self { addr, data: None }
    }

    /// Frame that writes `value` at `addr`
    pub const fn write(addr: u32, value: u8) -> Self {
        Self {
            addr,
            data: Some(value),
        }
    }

    /// Encode as opcode + BE address [+ data]
    pub fn encode(&self) -> Vec<u8, 6> {
        let mut buf = Vec::new();
        // Capacity is exactly opcode + address + data
        let _ = buf.push(CMD_BUS_ACCESS);
        let _ = buf.extend_from_slice(&self.addr.to_be_bytes());
        if let Some(value) = self.data {
            let _ = buf.push(value);
        }
        buf
    }

    /// Decode a frame, returning `None` for anything that is not a bus access
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 5 || bytes.len() > 6 || bytes[0] != CMD_BUS_ACCESS {
            return None;
        }
        let addr = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        Some(Self {
            addr,
            data: bytes.get(5).copied(),
        })
    }
}

/// Split a 24-bit DRAM address into window byte and low 16 bits
pub const fn split_dram_addr(addr: u32) -> (u8, u16) {
    (((addr >> 16) & 0xFF) as u8, (addr & 0xFFFF) as u16)
}
