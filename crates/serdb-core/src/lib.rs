//! serdb-core - Core library for the SERDB I2C debug bridge
//!
//! This crate talks to the SERDB debug port found on MStar-based display
//! controllers. It provides the transport trait, the wire protocol, a
//! session that tracks the bridge's channel state, typed access to the
//! XDATA, DRAM and RIU address spaces, and the 8051 ↔ AEON mailbox RPC.
//!
//! Transports live in separate crates and plug in through [`bus::I2cBus`].
//!
//! # Features
//!
//! - `serde` - Derive `Serialize` on status snapshot types
//!
//! # Example
//!
//! ```ignore
//! use serdb_core::mailbox::{self, Mailbox};
//! use serdb_core::{Session, SessionConfig};
//!
//! fn post<B: serdb_core::I2cBus>(bus: B) -> serdb_core::Result<()> {
//!     let mut session = Session::open(bus, SessionConfig::default())?;
//!     session.write_dram(0x100000, 0xAB)?;
//!     let mut mb = Mailbox::new(&mut session);
//!     mb.send_command(0x10, &[0x00, 0x10], true, mailbox::DEFAULT_TIMEOUT)?;
//!     session.close()
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bus;
pub mod error;
pub mod hexdump;
pub mod mailbox;
pub mod protocol;
pub mod session;
pub mod space;
pub mod target;

pub use bus::I2cBus;
pub use error::{BusError, BusResult, Error, Result};
pub use protocol::Channel;
pub use session::{Session, SessionConfig, SessionState};
pub use space::{Difference, ScanOutcome, XdataAccess};
