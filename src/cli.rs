//! CLI argument parsing

use crate::buses;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal u16
pub fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let v = parse_hex_u32(s)?;
    u16::try_from(v).map_err(|_| format!("Value 0x{:X} does not fit in 16 bits", v))
}

/// Parse a string as a hex or decimal u8
pub fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let v = parse_hex_u32(s)?;
    u8::try_from(v).map_err(|_| format!("Value 0x{:X} does not fit in 8 bits", v))
}

/// Parse a hex byte string such as `DEADBEEF`, `de ad be ef` or `0xde,0xad`
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let tokens: Vec<&str> = s
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .filter(|t| !t.is_empty())
        .collect();

    // A single run of hex digits is split into pairs
    if tokens.len() == 1 {
        let t = tokens[0];
        let t = t
            .strip_prefix("0x")
            .or_else(|| t.strip_prefix("0X"))
            .unwrap_or(t);
        if t.len() > 2 {
            if !t.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(format!("Invalid hex digits in '{}'", s));
            }
            if t.len() % 2 != 0 {
                return Err(format!("Odd number of hex digits in '{}'", s));
            }
            return t
                .as_bytes()
                .chunks(2)
                .map(|pair| {
                    // Only ASCII hex digits remain
                    let pair = std::str::from_utf8(pair).map_err(|e| e.to_string())?;
                    u8::from_str_radix(pair, 16)
                        .map_err(|e| format!("Invalid hex byte '{}': {}", pair, e))
                })
                .collect();
        }
    }

    tokens
        .iter()
        .map(|t| {
            let t = t
                .strip_prefix("0x")
                .or_else(|| t.strip_prefix("0X"))
                .unwrap_or(t);
            u8::from_str_radix(t, 16).map_err(|e| format!("Invalid hex byte '{}': {}", t, e))
        })
        .collect()
}

/// Generate dynamic help text for the bus argument
fn bus_help() -> String {
    format!(
        "Transport to use [available: {}]",
        buses::bus_names_short()
    )
}

#[derive(Parser)]
#[command(name = "serdb")]
#[command(author, version, about = "SERDB debug bridge client", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Bus: sim://, ftdi://ftdi:232h/1, /dev/i2c-N or a bus number
    #[arg(short, long, global = true, default_value = "sim://", help = bus_help())]
    pub bus: String,

    /// 7-bit I2C address of the bridge
    #[arg(long, global = true, default_value = "0x59", value_parser = parse_hex_u8)]
    pub address: u8,

    /// Pause after every bus transaction, in microseconds
    #[arg(long, global = true, default_value = "1000")]
    pub delay_us: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the bridge answers
    Probe,

    /// List supported transports and connected adapters
    ListBuses,

    /// 8051 XDATA space
    #[command(subcommand)]
    Xdata(XdataCommands),

    /// Shared DRAM through the window register
    #[command(subcommand)]
    Dram(DramCommands),

    /// 16-bit RIU registers
    #[command(subcommand)]
    Riu(RiuCommands),

    /// Stop or resume the 8051
    #[command(subcommand)]
    Mcu(McuCommands),

    /// Mailbox RPC
    #[command(subcommand)]
    Mailbox(MailboxCommands),

    /// AEON coprocessor control
    #[command(subcommand)]
    Aeon(AeonCommands),

    /// Firmware watchdog
    #[command(subcommand)]
    Watchdog(WatchdogCommands),

    /// Print AEON, watchdog, mailbox, firmware state and GWin bytes
    State {
        /// Print as JSON
        #[arg(short, long, conflicts_with = "watch")]
        json: bool,
        /// Sample until Ctrl-C and list what changed
        #[arg(short, long)]
        watch: bool,
        /// Sampling interval for --watch, in milliseconds
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,
    },
}

/// Output options shared by range reads
#[derive(clap::Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Write the bytes to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum XdataCommands {
    /// Read one byte
    Read {
        /// Address (hex or decimal)
        #[arg(value_parser = parse_hex_u16)]
        addr: u16,
    },

    /// Write one byte
    Write {
        /// Address (hex or decimal)
        #[arg(value_parser = parse_hex_u16)]
        addr: u16,
        /// Value (hex or decimal)
        #[arg(value_parser = parse_hex_u8)]
        value: u8,
    },

    /// Read a range, a named region or all 64 KiB
    Dump {
        /// Start address
        #[arg(value_parser = parse_hex_u16, required_unless_present_any = ["region", "full"])]
        start: Option<u16>,
        /// Length in bytes
        #[arg(value_parser = parse_hex_u32, required_unless_present_any = ["region", "full"])]
        len: Option<u32>,

        /// Named region (system, riu, mailbox, state, gwin, extended)
        #[arg(long, conflicts_with_all = ["start", "len", "full"])]
        region: Option<String>,

        /// Whole XDATA space
        #[arg(long, conflicts_with_all = ["start", "len"])]
        full: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Dump every named region
    Regions {
        /// Save each region as xdata_<name>_<start>.bin in this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the key firmware variables
    Vars,
}

#[derive(Subcommand)]
pub enum DramCommands {
    /// Read one byte
    Read {
        /// 24-bit address
        #[arg(value_parser = parse_hex_u32)]
        addr: u32,
    },

    /// Write one byte
    Write {
        /// 24-bit address
        #[arg(value_parser = parse_hex_u32)]
        addr: u32,
        /// Value
        #[arg(value_parser = parse_hex_u8)]
        value: u8,
    },

    /// Read a range or a named buffer
    Dump {
        /// Start address
        #[arg(value_parser = parse_hex_u32, required_unless_present = "buffer")]
        start: Option<u32>,
        /// Length in bytes
        #[arg(value_parser = parse_hex_u32, required_unless_present = "buffer")]
        len: Option<u32>,

        /// Named buffer (secondary, main, output) instead of start/len
        #[arg(long, conflicts_with_all = ["start", "len"])]
        buffer: Option<String>,

        /// Read at most this many bytes of the named buffer
        #[arg(long, value_parser = parse_hex_u32, requires = "buffer")]
        limit: Option<u32>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Find every occurrence of a byte pattern
    Search {
        /// Pattern as hex bytes, e.g. "FFD8FF"
        #[arg(value_parser = parse_hex_bytes)]
        pattern: ::std::vec::Vec<u8>,
        /// First address to scan
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x0C0000")]
        start: u32,
        /// End of the scan (exclusive)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x180000")]
        end: u32,
    },

    /// Compare two regions byte by byte
    Compare {
        /// First region
        #[arg(value_parser = parse_hex_u32)]
        first: u32,
        /// Second region
        #[arg(value_parser = parse_hex_u32)]
        second: u32,
        /// Length in bytes
        #[arg(value_parser = parse_hex_u32)]
        len: u32,
    },
}

#[derive(Subcommand)]
pub enum RiuCommands {
    /// Read a 16-bit register
    Read {
        /// Bank
        #[arg(value_parser = parse_hex_u8)]
        bank: u8,
        /// Offset within the bank
        #[arg(value_parser = parse_hex_u8)]
        offset: u8,
        /// Use the PM RIU instead of the non-PM RIU
        #[arg(long)]
        pm: bool,
    },

    /// Write a 16-bit register
    Write {
        /// Bank
        #[arg(value_parser = parse_hex_u8)]
        bank: u8,
        /// Offset within the bank
        #[arg(value_parser = parse_hex_u8)]
        offset: u8,
        /// Value
        #[arg(value_parser = parse_hex_u16)]
        value: u16,
        /// Use the PM RIU instead of the non-PM RIU
        #[arg(long)]
        pm: bool,
    },
}

#[derive(Subcommand)]
pub enum McuCommands {
    /// Halt the 8051
    Stop,
    /// Let the 8051 run again
    Resume,
}

#[derive(Subcommand)]
pub enum MailboxCommands {
    /// Show the mailbox registers
    Status,

    /// Post a command
    Send {
        /// Command byte
        #[arg(value_parser = parse_hex_u8)]
        cmd: u8,
        /// Parameter bytes (up to 21)
        #[arg(value_parser = parse_hex_u8)]
        params: Vec<u8>,
        /// Do not wait for a reply
        #[arg(long)]
        no_wait: bool,
        /// Reply timeout in milliseconds
        #[arg(long, default_value = "1000")]
        timeout_ms: u64,
    },

    /// Print status and command changes until Ctrl-C
    Watch {
        /// Sampling interval in milliseconds
        #[arg(long, default_value = "500")]
        interval_ms: u64,
    },
}

#[derive(Subcommand)]
pub enum AeonCommands {
    /// Show the control register
    Status,
    /// Clear RUN
    Halt,
    /// Set RUN
    Resume,
    /// Enable and release reset without running
    Enable,
    /// Clear all control bits
    Disable,
    /// Halt, disable, enable and resume
    Reset {
        /// Time held in reset, in milliseconds
        #[arg(long, default_value = "100")]
        delay_ms: u64,
    },
}

#[derive(Subcommand)]
pub enum WatchdogCommands {
    /// Show state and counter
    Status,
    /// Set the enable bit
    Enable,
    /// Clear the enable bit
    Disable,
    /// Write the counter
    Feed {
        /// New counter value
        #[arg(value_parser = parse_hex_u16, default_value = "0")]
        value: u16,
    },
    /// Print the counter until Ctrl-C
    Watch {
        /// Sampling interval in milliseconds
        #[arg(long, default_value = "500")]
        interval_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_hex_u32("0x100000"), Ok(0x100000));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert_eq!(parse_hex_u16("0x4401"), Ok(0x4401));
        assert!(parse_hex_u16("0x10000").is_err());
        assert_eq!(parse_hex_u8("0xFF"), Ok(0xFF));
        assert!(parse_hex_u8("256").is_err());
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(parse_hex_bytes("FFD8FF"), Ok(vec![0xFF, 0xD8, 0xFF]));
        assert_eq!(parse_hex_bytes("de ad be ef"), Ok(vec![0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(parse_hex_bytes("0x12,0x34"), Ok(vec![0x12, 0x34]));
        assert_eq!(parse_hex_bytes("7"), Ok(vec![0x07]));
        assert!(parse_hex_bytes("ABC").is_err());
        assert!(parse_hex_bytes("xy").is_err());
    }

    #[test]
    fn test_parse_hex_bytes_non_ascii() {
        assert!(parse_hex_bytes("a\u{e9}b").is_err());
        assert!(parse_hex_bytes("\u{e9}\u{e9}").is_err());
        assert!(parse_hex_bytes("ff \u{e9}").is_err());
    }

    #[test]
    fn test_dram_dump_buffer() {
        let cli = Cli::try_parse_from(["serdb", "dram", "dump", "--buffer", "main", "--limit", "0x100"])
            .unwrap();
        match cli.command {
            Commands::Dram(DramCommands::Dump {
                start,
                len,
                buffer,
                limit,
                ..
            }) => {
                assert_eq!(start, None);
                assert_eq!(len, None);
                assert_eq!(buffer.as_deref(), Some("main"));
                assert_eq!(limit, Some(0x100));
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_xdata_dump_forms() {
        let cli = Cli::try_parse_from(["serdb", "xdata", "dump", "--region", "gwin"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Xdata(XdataCommands::Dump {
                start: None,
                len: None,
                full: false,
                ref region,
                ..
            }) if region.as_deref() == Some("gwin")
        ));

        let cli = Cli::try_parse_from(["serdb", "xdata", "dump", "--full", "-o", "x.bin"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Xdata(XdataCommands::Dump { full: true, .. })
        ));

        let cli = Cli::try_parse_from(["serdb", "xdata", "dump", "0x4000", "0x500"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Xdata(XdataCommands::Dump {
                start: Some(0x4000),
                len: Some(0x500),
                ..
            })
        ));

        assert!(Cli::try_parse_from(["serdb", "xdata", "dump"]).is_err());
        assert!(Cli::try_parse_from(["serdb", "xdata", "dump", "--region", "gwin", "--full"]).is_err());
    }

    #[test]
    fn test_watch_commands() {
        let cli = Cli::try_parse_from(["serdb", "state", "--watch", "-i", "250"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::State {
                json: false,
                watch: true,
                interval_ms: 250,
            }
        ));
        assert!(Cli::try_parse_from(["serdb", "state", "--watch", "--json"]).is_err());

        let cli = Cli::try_parse_from(["serdb", "watchdog", "watch"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Watchdog(WatchdogCommands::Watch { interval_ms: 500 })
        ));
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "serdb", "xdata", "read", "0x40FB", "--bus", "/dev/i2c-3", "--address", "0x50", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.bus, "/dev/i2c-3");
        assert_eq!(cli.address, 0x50);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Xdata(XdataCommands::Read { addr: 0x40FB })
        ));
    }
}
