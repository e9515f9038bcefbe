//! Probe command implementation

use serdb_core::{Session, SessionConfig};
use std::time::Duration;

/// Check whether a bridge answers on `bus`
///
/// A bridge that does not answer is reported, not treated as an error.
pub fn run_probe(bus: &str, address: u8, delay_us: u64) -> Result<(), Box<dyn std::error::Error>> {
    let transport = serdb_bus::open_bus(bus)?;
    let config = SessionConfig::default()
        .with_address(address)
        .with_delay(Duration::from_micros(delay_us));
    let mut session = Session::new(transport, config);

    if session.probe() {
        println!("SERDB bridge found at 0x{:02X} on {}", address, bus);
        let window = session.read_xdata(serdb_core::protocol::DRAM_WINDOW_REG)?;
        println!("  DRAM window: 0x{:02X}", window);
        session.close()?;
    } else {
        println!("No SERDB bridge at 0x{:02X} on {}", address, bus);
    }
    Ok(())
}
