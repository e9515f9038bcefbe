//! List commands implementation

use serdb_core::target::{DRAM_REGIONS, XDATA_REGIONS};

/// List compiled-in transports, connected FTDI adapters and named regions
pub fn list_buses() {
    println!("Supported buses:");
    println!();
    for bus in serdb_bus::available_buses() {
        println!("  {:<10} - {}", bus.name, bus.description);
        println!("  {:<10}   e.g. {}", "", bus.examples.join(", "));
    }

    #[cfg(feature = "ftdi")]
    {
        println!();
        match serdb_bus::list_ftdi_devices() {
            Ok(devices) if devices.is_empty() => println!("No FTDI adapters connected"),
            Ok(devices) => {
                println!("Connected FTDI adapters:");
                for dev in devices {
                    println!(
                        "  {:03}:{:03}  {:<8} {}  serial {}",
                        dev.bus,
                        dev.address,
                        dev.device_type.name(),
                        dev.url(),
                        dev.serial.as_deref().unwrap_or("-")
                    );
                }
            }
            Err(e) => log::warn!("Could not enumerate USB devices: {}", e),
        }
    }

    println!();
    println!("Named DRAM buffers (dram dump --buffer NAME):");
    for region in DRAM_REGIONS {
        println!(
            "  {:<10} 0x{:06X}..0x{:06X}  {}",
            region.name,
            region.start,
            region.start + region.len,
            region.description
        );
    }

    println!();
    println!("Named XDATA regions (xdata dump --region NAME):");
    for region in XDATA_REGIONS {
        println!(
            "  {:<10} 0x{:04X}..0x{:04X}  {}",
            region.name,
            region.start,
            region.start as u32 + region.len as u32,
            region.description
        );
    }
}
