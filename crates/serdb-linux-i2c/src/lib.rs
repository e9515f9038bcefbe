//! serdb-linux-i2c - Linux i2c-dev support
//!
//! This crate provides a SERDB transport over Linux I2C adapters via the
//! `/dev/i2c-N` device interface.
//!
//! # Example
//!
//! ```no_run
//! use serdb_core::{Session, SessionConfig};
//! use serdb_linux_i2c::LinuxI2c;
//!
//! let bus = LinuxI2c::open_device("/dev/i2c-1")?;
//! let mut session = Session::open(bus, SessionConfig::default())?;
//! println!("mailbox cmd: 0x{:02X}", session.read_xdata(0x4401)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with serdb CLI
//!
//! ```bash
//! serdb --bus /dev/i2c-1 probe
//! serdb --bus 1 xdata read 0x4401
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with i2c-dev loaded (`modprobe i2c-dev`)
//! - Read/write access to `/dev/i2c-N`
//! - May require adding user to the `i2c` group

pub mod device;
pub mod error;

// Re-exports
pub use device::{LinuxI2c, LinuxI2cConfig};
pub use error::{LinuxI2cError, Result};

/// Open a Linux I2C device and return a boxed I2cBus
///
/// `name` is `/dev/i2c-N` or a bare bus number.
pub fn open_linux_i2c(
    name: &str,
) -> std::result::Result<Box<dyn serdb_core::I2cBus>, LinuxI2cError> {
    let bus = LinuxI2c::open_device(name)?;
    Ok(Box::new(bus))
}
