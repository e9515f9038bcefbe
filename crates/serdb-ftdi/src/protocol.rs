//! FTDI MPSSE constants and I2C command builders
//!
//! Based on FTDI AN_113 / AN_255 (I2C over MPSSE). The bus is driven with
//! three-phase clocking; open drain is emulated by switching SDA between
//! output-low and input.
//!
//! Pin assignments (low byte):
//!
//! ```text
//! AD0  SCL
//! AD1  SDA out
//! AD2  SDA in   (tie to AD1)
//! ```

// ============================================================================
// USB VID/PID constants
// ============================================================================

/// FTDI vendor ID
pub const FTDI_VID: u16 = 0x0403;

/// FT2232H product ID (dual channel)
pub const FTDI_FT2232H_PID: u16 = 0x6010;

/// FT4232H product ID (quad channel)
pub const FTDI_FT4232H_PID: u16 = 0x6011;

/// FT232H product ID (single channel)
pub const FTDI_FT232H_PID: u16 = 0x6014;

// ============================================================================
// MPSSE Commands
// ============================================================================

/// Clock bytes out, MSB first
pub const MPSSE_DO_WRITE: u8 = 0x10;

/// Clock bytes in, MSB first
pub const MPSSE_DO_READ: u8 = 0x20;

/// Write on negative clock edge
pub const MPSSE_WRITE_NEG: u8 = 0x01;

/// Bit mode (transfer bits instead of bytes)
pub const MPSSE_BITMODE: u8 = 0x02;

/// Set data bits low byte
pub const SET_BITS_LOW: u8 = 0x80;

/// Disable loopback mode
pub const LOOPBACK_END: u8 = 0x85;

/// Set clock divisor
pub const TCK_DIVISOR: u8 = 0x86;

/// Send immediate (flush buffers)
pub const SEND_IMMEDIATE: u8 = 0x87;

/// Disable divide-by-5 prescaler (60 MHz clock)
pub const DIS_DIV_5: u8 = 0x8A;

/// Enable 3-phase clocking (for I2C)
pub const EN_3_PHASE: u8 = 0x8C;

/// Disable adaptive clocking
pub const CLK_NO_ADAPTIVE: u8 = 0x97;

// ============================================================================
// Pins and timing
// ============================================================================

/// SCL on AD0
pub const PIN_SCL: u8 = 1 << 0;
/// SDA output on AD1
pub const PIN_SDA_OUT: u8 = 1 << 1;
/// SDA input on AD2
pub const PIN_SDA_IN: u8 = 1 << 2;

/// Direction with SCL and SDA driven
const DIR_DRIVE: u8 = PIN_SCL | PIN_SDA_OUT;
/// Direction with SDA released for the target
const DIR_RELEASE: u8 = PIN_SCL;

/// How often each START/STOP pin state is repeated to meet hold times
const HOLD_REPEAT: usize = 4;

/// Base clock of the H-series parts
pub const BASE_CLOCK_HZ: u32 = 60_000_000;

/// Default I2C clock
pub const DEFAULT_FREQUENCY_HZ: u32 = 100_000;

/// Highest supported I2C clock
pub const MAX_FREQUENCY_HZ: u32 = 3_400_000;

// ============================================================================
// Supported device types
// ============================================================================

/// Supported FTDI device types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtdiDeviceType {
    /// FT232H (single channel)
    #[default]
    Ft232H,
    /// FT2232H (dual channel)
    Ft2232H,
    /// FT4232H (quad channel)
    Ft4232H,
}

impl FtdiDeviceType {
    /// Get the vendor ID for this device type
    pub fn vendor_id(&self) -> u16 {
        FTDI_VID
    }

    /// Get the product ID for this device type
    pub fn product_id(&self) -> u16 {
        match self {
            FtdiDeviceType::Ft232H => FTDI_FT232H_PID,
            FtdiDeviceType::Ft2232H => FTDI_FT2232H_PID,
            FtdiDeviceType::Ft4232H => FTDI_FT4232H_PID,
        }
    }

    /// Get the number of MPSSE-capable channels
    pub fn channel_count(&self) -> u8 {
        match self {
            FtdiDeviceType::Ft232H => 1,
            // Only A and B have an MPSSE on the FT4232H
            FtdiDeviceType::Ft2232H | FtdiDeviceType::Ft4232H => 2,
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            FtdiDeviceType::Ft232H => "FT232H",
            FtdiDeviceType::Ft2232H => "FT2232H",
            FtdiDeviceType::Ft4232H => "FT4232H",
        }
    }

    /// Parse the product part of an FTDI URL (`232h`, `2232h`, `4232h`)
    pub fn from_url_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "232h" | "ft232h" => Some(FtdiDeviceType::Ft232H),
            "2232h" | "ft2232h" => Some(FtdiDeviceType::Ft2232H),
            "4232h" | "ft4232h" => Some(FtdiDeviceType::Ft4232H),
            _ => None,
        }
    }

    /// Map a USB product ID back to a device type
    pub fn from_pid(pid: u16) -> Option<Self> {
        match pid {
            FTDI_FT232H_PID => Some(FtdiDeviceType::Ft232H),
            FTDI_FT2232H_PID => Some(FtdiDeviceType::Ft2232H),
            FTDI_FT4232H_PID => Some(FtdiDeviceType::Ft4232H),
            _ => None,
        }
    }
}

/// FTDI interface/channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtdiInterface {
    /// Interface A
    #[default]
    A,
    /// Interface B
    B,
    /// Interface C
    C,
    /// Interface D
    D,
}

impl FtdiInterface {
    /// Zero-based index
    pub fn index(&self) -> u8 {
        match self {
            FtdiInterface::A => 0,
            FtdiInterface::B => 1,
            FtdiInterface::C => 2,
            FtdiInterface::D => 3,
        }
    }

    /// Channel letter
    pub fn letter(&self) -> char {
        (b'A' + self.index()) as char
    }

    /// Interface from the 1-based number used in URLs
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(FtdiInterface::A),
            2 => Some(FtdiInterface::B),
            3 => Some(FtdiInterface::C),
            4 => Some(FtdiInterface::D),
            _ => None,
        }
    }
}

/// MPSSE clock divisor for `freq_hz` with three-phase clocking
pub fn clock_divisor(freq_hz: u32) -> u16 {
    let freq = freq_hz.clamp(1, MAX_FREQUENCY_HZ);
    let div = (BASE_CLOCK_HZ / (3 * freq)).saturating_sub(1);
    div.min(u16::MAX as u32) as u16
}

/// Actual I2C clock produced by `divisor`
pub fn divisor_to_frequency(divisor: u16) -> u32 {
    BASE_CLOCK_HZ / (3 * (divisor as u32 + 1))
}

fn set_pins(buf: &mut Vec<u8>, value: u8, dir: u8) {
    buf.extend_from_slice(&[SET_BITS_LOW, value, dir]);
}

/// Engine setup: 60 MHz clock, three-phase clocking, bus idle
pub fn push_init(buf: &mut Vec<u8>, freq_hz: u32) {
    let div = clock_divisor(freq_hz);
    buf.extend_from_slice(&[DIS_DIV_5, CLK_NO_ADAPTIVE, EN_3_PHASE]);
    buf.extend_from_slice(&[TCK_DIVISOR, (div & 0xFF) as u8, (div >> 8) as u8]);
    buf.push(LOOPBACK_END);
    push_idle(buf);
}

/// Both lines high
pub fn push_idle(buf: &mut Vec<u8>) {
    set_pins(buf, PIN_SCL | PIN_SDA_OUT, DIR_DRIVE);
}

/// SDA falls while SCL is high, then SCL falls
pub fn push_start(buf: &mut Vec<u8>) {
    for _ in 0..HOLD_REPEAT {
        set_pins(buf, PIN_SCL | PIN_SDA_OUT, DIR_DRIVE);
    }
    for _ in 0..HOLD_REPEAT {
        set_pins(buf, PIN_SCL, DIR_DRIVE);
    }
    set_pins(buf, 0, DIR_DRIVE);
}

/// SDA rises while SCL is high
pub fn push_stop(buf: &mut Vec<u8>) {
    for _ in 0..HOLD_REPEAT {
        set_pins(buf, 0, DIR_DRIVE);
    }
    for _ in 0..HOLD_REPEAT {
        set_pins(buf, PIN_SCL, DIR_DRIVE);
    }
    for _ in 0..HOLD_REPEAT {
        push_idle(buf);
    }
}

/// Clock out `byte`, then clock in the ACK bit
///
/// Queues one byte of response: bit 0 is the ACK bit (0 = ACK).
pub fn push_write_byte(buf: &mut Vec<u8>, byte: u8) {
    buf.extend_from_slice(&[MPSSE_DO_WRITE | MPSSE_WRITE_NEG, 0x00, 0x00, byte]);
    set_pins(buf, 0, DIR_RELEASE);
    buf.extend_from_slice(&[MPSSE_DO_READ | MPSSE_BITMODE, 0x00]);
    set_pins(buf, 0, DIR_DRIVE);
}

/// Clock in one byte and answer with ACK or NAK
///
/// Queues one byte of response: the data byte.
pub fn push_read_byte(buf: &mut Vec<u8>, ack: bool) {
    set_pins(buf, 0, DIR_RELEASE);
    buf.extend_from_slice(&[MPSSE_DO_READ, 0x00, 0x00]);
    set_pins(buf, 0, DIR_DRIVE);
    let bit = if ack { 0x00 } else { 0xFF };
    buf.extend_from_slice(&[MPSSE_DO_WRITE | MPSSE_BITMODE | MPSSE_WRITE_NEG, 0x00, bit]);
    set_pins(buf, 0, DIR_DRIVE);
}

/// Full write transaction; response is one ACK byte per written byte
pub fn build_write(addr: u8, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + data.len() * 16);
    push_start(&mut buf);
    push_write_byte(&mut buf, addr << 1);
    for &b in data {
        push_write_byte(&mut buf, b);
    }
    push_stop(&mut buf);
    buf.push(SEND_IMMEDIATE);
    buf
}

/// Full one-byte read transaction; response is the address ACK byte, then data
pub fn build_read(addr: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(96);
    push_start(&mut buf);
    push_write_byte(&mut buf, addr << 1 | 1);
    push_read_byte(&mut buf, false);
    push_stop(&mut buf);
    buf.push(SEND_IMMEDIATE);
    buf
}

/// True if an ACK bit read back by [`push_write_byte`] is a NAK
pub fn is_nak(ack: u8) -> bool {
    ack & 0x01 != 0
}
