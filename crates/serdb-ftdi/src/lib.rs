//! serdb-ftdi - FTDI MPSSE I2C transport
//!
//! This crate drives a SERDB bridge through an FTDI H-series USB adapter
//! (FT232H, FT2232H, FT4232H) with the MPSSE engine in I2C mode.
//!
//! # Adapter URLs
//!
//! ```text
//! ftdi://ftdi:232h/1              FT232H
//! ftdi://ftdi:2232h/2             FT2232H channel B
//! ftdi://ftdi:4232h/1?freq=400000 FT4232H channel A at 400 kHz
//! ```
//!
//! # Wiring
//!
//! AD0 is SCL. AD1 and AD2 are tied together and form SDA. Both lines need
//! external pull-ups.
//!
//! # Features
//!
//! - `libftdi` - Open adapters through libftdi1 ([`FtdiI2c`]). URL parsing,
//!   the MPSSE command builders and [`list_devices`] work without it.

pub mod config;
pub mod error;
pub mod protocol;

#[cfg(feature = "libftdi")]
mod device;

pub use config::{list_devices, FtdiConfig, FtdiDeviceInfo};
pub use error::{FtdiError, Result};
pub use protocol::{FtdiDeviceType, FtdiInterface};

#[cfg(feature = "libftdi")]
pub use device::FtdiI2c;

/// Open an FTDI adapter from its URL and return a boxed I2cBus
#[cfg(feature = "libftdi")]
pub fn open_ftdi(url: &str) -> Result<Box<dyn serdb_core::I2cBus>> {
    Ok(Box::new(FtdiI2c::open_url(url)?))
}
