//! Transport selection and session setup
//!
//! Wraps the `serdb-bus` registry so commands get a ready [`Session`] and
//! the session is always closed afterwards.

use serdb_core::{I2cBus, Session, SessionConfig};
use std::time::Duration;

/// A session over whatever transport the bus string selected
pub type CliSession = Session<Box<dyn I2cBus>>;

/// Short list of transports for `--help`
pub fn bus_names_short() -> String {
    serdb_bus::bus_names_short()
}

/// Open `bus`, run the SERDB handshake and hand the session to `f`
///
/// The session is closed whether or not `f` succeeds. A close failure is
/// only reported when `f` itself succeeded.
pub fn with_session<F>(
    bus: &str,
    address: u8,
    delay_us: u64,
    f: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut CliSession) -> Result<(), Box<dyn std::error::Error>>,
{
    let transport = serdb_bus::open_bus(bus)?;
    let config = SessionConfig::default()
        .with_address(address)
        .with_delay(Duration::from_micros(delay_us));

    log::debug!("Connecting to SERDB at 0x{:02X} on '{}'", address, bus);
    let mut session = Session::open(transport, config)?;

    let result = f(&mut session);
    let closed = session.close();

    result?;
    closed?;
    Ok(())
}
