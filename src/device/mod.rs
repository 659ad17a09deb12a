//! # Device Matcher Module
//!
//! Finds the serial ports that should be supervised as sensor ports.
//!
//! ## Recognition
//!
//! A port qualifies when its description contains the configured recognition
//! string. The description of a USB port is the product string the adapter
//! reports (for example `FT232R USB UART`). Ports without a USB product string
//! (on-board UARTs, Bluetooth, PCI) never qualify.

use std::collections::BTreeSet;
use tokio_serial::{SerialPortInfo, SerialPortType};
use tracing::debug;

/// Reports the sensor ports currently attached
#[cfg_attr(test, mockall::automock)]
pub trait DeviceMatcher: Send {
    /// Device paths of every qualifying port; empty when enumeration fails
    fn detect(&self) -> BTreeSet<String>;
}

/// Matches ports by a substring of their description
#[derive(Debug, Clone)]
pub struct DescriptionMatcher {
    filter: String,
}

impl DescriptionMatcher {
    pub fn new(filter: impl Into<String>) -> Self {
        Self { filter: filter.into() }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }
}

impl DeviceMatcher for DescriptionMatcher {
    fn detect(&self) -> BTreeSet<String> {
        match tokio_serial::available_ports() {
            Ok(ports) => matching_ports(&ports, &self.filter),
            Err(e) => {
                debug!("Port enumeration unavailable: {}", e);
                BTreeSet::new()
            }
        }
    }
}

/// Description of a port, if the host reports one
pub fn port_description(info: &SerialPortInfo) -> Option<&str> {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => usb.product.as_deref(),
        _ => None,
    }
}

/// Paths of the ports whose description contains `filter`
pub fn matching_ports(ports: &[SerialPortInfo], filter: &str) -> BTreeSet<String> {
    ports
        .iter()
        .filter(|info| {
            let matched = port_description(info).is_some_and(|d| d.contains(filter));
            debug!(
                "Found port: {} (description: {:?}, matched: {})",
                info.port_name,
                port_description(info),
                matched
            );
            matched
        })
        .map(|info| info.port_name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_serial::UsbPortInfo;

    fn usb(name: &str, product: Option<&str>) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x0403,
                pid: 0x6001,
                serial_number: None,
                manufacturer: Some("FTDI".to_string()),
                product: product.map(str::to_string),
            }),
        }
    }

    fn onboard(name: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::Unknown,
        }
    }

    #[test]
    fn test_matches_by_product_description() {
        let ports = vec![
            usb("/dev/ttyUSB1", Some("FT232R USB UART")),
            usb("/dev/ttyUSB0", Some("FT232R USB UART")),
            usb("/dev/ttyUSB2", Some("CP2102 USB to UART Bridge")),
            onboard("/dev/ttyS0"),
        ];

        let matched = matching_ports(&ports, "FT232R");
        let expected: BTreeSet<String> = ["/dev/ttyUSB0", "/dev/ttyUSB1"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(matched, expected);
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let ports = vec![usb("/dev/ttyUSB0", Some("ft232r usb uart"))];
        assert!(matching_ports(&ports, "FT232R").is_empty());
    }

    #[test]
    fn test_port_without_description_never_matches() {
        let ports = vec![usb("/dev/ttyUSB0", None), onboard("/dev/ttyAMA0")];
        assert!(matching_ports(&ports, "FT232R").is_empty());
        assert_eq!(port_description(&ports[1]), None);
    }

    #[test]
    fn test_detect_is_repeatable() {
        // Whatever the host has attached, two polls in a row agree
        let matcher = DescriptionMatcher::new("FT232R");
        assert_eq!(matcher.detect(), matcher.detect());
        assert_eq!(matcher.filter(), "FT232R");
    }
}
