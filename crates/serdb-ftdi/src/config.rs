//! Adapter selection: `ftdi://` URLs and USB enumeration

use crate::error::{FtdiError, Result};
use crate::protocol::*;

/// Configuration for opening an FTDI adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtdiConfig {
    /// Device type (determines PID and channel count)
    pub device_type: FtdiDeviceType,
    /// Interface/channel to use
    pub interface: FtdiInterface,
    /// I2C clock in Hz
    pub frequency_hz: u32,
}

impl Default for FtdiConfig {
    fn default() -> Self {
        FtdiConfig {
            device_type: FtdiDeviceType::default(),
            interface: FtdiInterface::default(),
            frequency_hz: DEFAULT_FREQUENCY_HZ,
        }
    }
}

impl FtdiConfig {
    /// Create a new config for a specific device type
    pub fn for_device(device_type: FtdiDeviceType) -> Self {
        FtdiConfig {
            device_type,
            ..Default::default()
        }
    }

    /// Set the interface/channel
    pub fn interface(mut self, interface: FtdiInterface) -> Result<Self> {
        // Validate that the interface is available on this device
        let max_channel = self.device_type.channel_count();
        if interface.index() >= max_channel {
            return Err(FtdiError::InvalidChannel(format!(
                "Channel {} not available on {} (max: {})",
                interface.letter(),
                self.device_type.name(),
                (b'A' + max_channel - 1) as char
            )));
        }
        self.interface = interface;
        Ok(self)
    }

    /// Set the I2C clock
    pub fn frequency(mut self, frequency_hz: u32) -> Result<Self> {
        if frequency_hz == 0 || frequency_hz > MAX_FREQUENCY_HZ {
            return Err(FtdiError::InvalidParameter(format!(
                "Invalid frequency {} Hz: must be between 1 and {}",
                frequency_hz, MAX_FREQUENCY_HZ
            )));
        }
        self.frequency_hz = frequency_hz;
        Ok(self)
    }

    /// Parse an adapter URL
    ///
    /// Form: `ftdi://[vendor][:product]/interface[?freq=hz]`, e.g.
    /// `ftdi://ftdi:232h/1` or `ftdi://ftdi:2232h/2?freq=400000`. The
    /// interface number is 1-based. Product defaults to FT232H.
    pub fn from_url(url: &str) -> Result<Self> {
        let bad = |why: &str| FtdiError::InvalidUrl(format!("{}: {}", url, why));

        let rest = url
            .strip_prefix("ftdi://")
            .ok_or_else(|| bad("must start with ftdi://"))?;
        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None),
        };
        let (device, iface) = path
            .rsplit_once('/')
            .ok_or_else(|| bad("missing interface number"))?;

        let product = match device.split_once(':') {
            Some((vendor, product)) => {
                if !vendor.is_empty() && !vendor.eq_ignore_ascii_case("ftdi") {
                    return Err(bad("only the ftdi vendor is supported"));
                }
                product
            }
            None if device.is_empty() || device.eq_ignore_ascii_case("ftdi") => "",
            None => device,
        };
        let device_type = if product.is_empty() {
            FtdiDeviceType::default()
        } else {
            FtdiDeviceType::from_url_name(product)
                .ok_or_else(|| bad(&format!("unknown product '{}'", product)))?
        };

        let number: u8 = iface
            .parse()
            .map_err(|_| bad(&format!("bad interface '{}'", iface)))?;
        let interface = FtdiInterface::from_number(number)
            .ok_or_else(|| bad(&format!("interface {} out of range", number)))?;

        let mut config = Self::for_device(device_type).interface(interface)?;

        for pair in query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "freq" | "frequency" => {
                    let hz = value
                        .parse()
                        .map_err(|_| bad(&format!("bad frequency '{}'", value)))?;
                    config = config.frequency(hz)?;
                }
                _ => {
                    log::warn!("ftdi: ignoring unknown URL option '{}'", key);
                }
            }
        }

        Ok(config)
    }
}

/// Information about a connected FTDI adapter
#[derive(Debug, Clone)]
pub struct FtdiDeviceInfo {
    /// USB bus number
    pub bus: u8,
    /// USB device address
    pub address: u8,
    /// Product ID
    pub product_id: u16,
    /// Device type
    pub device_type: FtdiDeviceType,
    /// Serial number, if the OS exposes it
    pub serial: Option<String>,
}

impl FtdiDeviceInfo {
    /// URL for the first interface of this adapter
    pub fn url(&self) -> String {
        let name = match self.device_type {
            FtdiDeviceType::Ft232H => "232h",
            FtdiDeviceType::Ft2232H => "2232h",
            FtdiDeviceType::Ft4232H => "4232h",
        };
        format!("ftdi://ftdi:{}/1", name)
    }
}

/// List connected FTDI adapters that can do MPSSE
pub fn list_devices() -> Result<Vec<FtdiDeviceInfo>> {
    let mut devices = Vec::new();

    for dev in nusb::list_devices()? {
        if dev.vendor_id() != FTDI_VID {
            continue;
        }
        let pid = dev.product_id();
        if let Some(device_type) = FtdiDeviceType::from_pid(pid) {
            devices.push(FtdiDeviceInfo {
                bus: dev.bus_number(),
                address: dev.device_address(),
                product_id: pid,
                device_type,
                serial: dev.serial_number().map(str::to_string),
            });
        }
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_urls() {
        let c = FtdiConfig::from_url("ftdi://ftdi:232h/1").unwrap();
        assert_eq!(c.device_type, FtdiDeviceType::Ft232H);
        assert_eq!(c.interface, FtdiInterface::A);
        assert_eq!(c.frequency_hz, DEFAULT_FREQUENCY_HZ);

        let c = FtdiConfig::from_url("ftdi://ftdi:2232h/2?freq=400000").unwrap();
        assert_eq!(c.device_type, FtdiDeviceType::Ft2232H);
        assert_eq!(c.interface, FtdiInterface::B);
        assert_eq!(c.frequency_hz, 400_000);

        let c = FtdiConfig::from_url("ftdi:///1").unwrap();
        assert_eq!(c, FtdiConfig::default());
    }

    #[test]
    fn test_reject_bad_urls() {
        // FT232H only has one interface
        assert!(matches!(
            FtdiConfig::from_url("ftdi://ftdi:232h/2"),
            Err(FtdiError::InvalidChannel(_))
        ));
        assert!(FtdiConfig::from_url("ftdi://ftdi:4232h/3").is_err());
        assert!(FtdiConfig::from_url("ftdi://ftdi:232h").is_err());
        assert!(FtdiConfig::from_url("ftdi://acme:232h/1").is_err());
        assert!(FtdiConfig::from_url("ftdi://ftdi:232h/1?freq=fast").is_err());
        assert!(FtdiConfig::from_url("/dev/i2c-1").is_err());
    }

    #[test]
    fn test_info_url() {
        let info = FtdiDeviceInfo {
            bus: 1,
            address: 4,
            product_id: FTDI_FT2232H_PID,
            device_type: FtdiDeviceType::Ft2232H,
            serial: None,
        };
        assert_eq!(info.url(), "ftdi://ftdi:2232h/1");
    }
}
