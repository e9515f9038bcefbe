//! Transport registry
//!
//! Turns a bus string into an open [`I2cBus`]. The scheme decides the
//! backend:
//!
//! ```text
//! sim:// | sim          in-memory bridge emulator
//! ftdi://...           FTDI MPSSE adapter
//! /dev/i2c-N | N       Linux i2c-dev
//! ```
//!
//! Matching is by exact prefix. Backends left out at compile time are
//! reported as [`RegistryError::BackendDisabled`] rather than as unknown.

use serdb_core::I2cBus;
use thiserror::Error;

/// Errors from opening a bus
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No backend claims this string
    #[error("Unknown bus '{0}' (expected sim://, ftdi://..., /dev/i2c-N or a bus number)")]
    UnknownBus(String),

    /// The backend exists but was not compiled in
    #[error("{backend} support is not compiled in (enable the '{feature}' feature)")]
    BackendDisabled {
        /// Backend name
        backend: &'static str,
        /// Cargo feature that enables it
        feature: &'static str,
    },

    /// Linux I2C backend failed
    #[cfg(feature = "linux-i2c")]
    #[error(transparent)]
    LinuxI2c(#[from] serdb_linux_i2c::LinuxI2cError),

    /// FTDI backend failed
    #[cfg(feature = "ftdi")]
    #[error(transparent)]
    Ftdi(#[from] serdb_ftdi::FtdiError),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Which backend a bus string selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusKind {
    /// Simulation
    Sim,
    /// FTDI adapter URL
    Ftdi(String),
    /// Linux device path or bus number
    LinuxI2c(String),
}

impl BusKind {
    /// Classify a bus string without opening anything
    pub fn parse(name: &str) -> Result<Self> {
        if name == "sim" || name.starts_with("sim://") {
            return Ok(BusKind::Sim);
        }
        if name.starts_with("ftdi://") {
            return Ok(BusKind::Ftdi(name.to_string()));
        }
        let is_number = !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit());
        if is_number || name.starts_with("/dev/i2c-") {
            return Ok(BusKind::LinuxI2c(name.to_string()));
        }
        Err(RegistryError::UnknownBus(name.to_string()))
    }

    /// Backend name for messages
    pub fn name(&self) -> &'static str {
        match self {
            BusKind::Sim => "sim",
            BusKind::Ftdi(_) => "ftdi",
            BusKind::LinuxI2c(_) => "linux_i2c",
        }
    }
}

/// Open the transport named by `name`
pub fn open_bus(name: &str) -> Result<Box<dyn I2cBus>> {
    let kind = BusKind::parse(name)?;
    log::debug!("Opening {} bus '{}'", kind.name(), name);

    match kind {
        #[cfg(feature = "sim")]
        BusKind::Sim => Ok(Box::new(serdb_sim::SimBus::new_default())),
        #[cfg(not(feature = "sim"))]
        BusKind::Sim => Err(RegistryError::BackendDisabled {
            backend: "Simulation",
            feature: "sim",
        }),

        #[cfg(feature = "ftdi")]
        BusKind::Ftdi(url) => Ok(serdb_ftdi::open_ftdi(&url)?),
        #[cfg(not(feature = "ftdi"))]
        BusKind::Ftdi(_) => Err(RegistryError::BackendDisabled {
            backend: "FTDI",
            feature: "ftdi",
        }),

        #[cfg(feature = "linux-i2c")]
        BusKind::LinuxI2c(dev) => Ok(serdb_linux_i2c::open_linux_i2c(&dev)?),
        #[cfg(not(feature = "linux-i2c"))]
        BusKind::LinuxI2c(_) => Err(RegistryError::BackendDisabled {
            backend: "Linux I2C",
            feature: "linux-i2c",
        }),
    }
}

/// Information about a transport backend
#[derive(Debug, Clone)]
pub struct BusInfo {
    /// Backend name
    pub name: &'static str,
    /// Example bus strings
    pub examples: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all transports enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_buses() -> Vec<BusInfo> {
    let mut buses = Vec::new();

    #[cfg(feature = "sim")]
    buses.push(BusInfo {
        name: "sim",
        examples: &["sim://"],
        description: "In-memory SERDB bridge emulator for testing",
    });

    #[cfg(feature = "linux-i2c")]
    buses.push(BusInfo {
        name: "linux_i2c",
        examples: &["/dev/i2c-1", "1"],
        description: "Linux I2C adapter via i2c-dev",
    });

    #[cfg(feature = "ftdi")]
    buses.push(BusInfo {
        name: "ftdi",
        examples: &["ftdi://ftdi:232h/1", "ftdi://ftdi:2232h/2?freq=400000"],
        description: "FTDI MPSSE I2C (FT232H/FT2232H/FT4232H)",
    });

    buses
}

/// Generate a short list of bus kinds for CLI help
pub fn bus_names_short() -> String {
    let buses = available_buses();
    if buses.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = buses.iter().map(|b| b.name).collect();
    names.join(", ")
}

/// Connected FTDI adapters
#[cfg(feature = "ftdi")]
pub fn list_ftdi_devices() -> Result<Vec<serdb_ftdi::FtdiDeviceInfo>> {
    Ok(serdb_ftdi::list_devices()?)
}
