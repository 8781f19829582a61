use serde::{Deserialize, Serialize};

/// Bluetooth class-of-device filter applied during discovery.
///
/// Fixed per driver type; the robot controller advertises major class 31
/// ("uncategorized") with minor class 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceFilter {
    pub major_device_class: u8,
    pub minor_device_class: u8,
}

impl DeviceFilter {
    pub const ROBOT: DeviceFilter = DeviceFilter {
        major_device_class: 31,
        minor_device_class: 0,
    };

    pub fn matches(&self, major: u8, minor: u8) -> bool {
        self.major_device_class == major && self.minor_device_class == minor
    }
}

/// PIN used when pairing with the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingCredential(&'static str);

impl PairingCredential {
    pub const ROBOT: PairingCredential = PairingCredential("1234");

    pub fn pin(&self) -> &str {
        self.0
    }
}

/// A device reported by an open discovery session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Transport-specific identifier passed back to `connect`
    pub id: String,
    pub name: String,
    /// Received signal strength, when the transport reports one
    pub rssi: Option<i16>,
}

impl DiscoveredDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rssi: None,
        }
    }

    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robot_filter() {
        assert!(DeviceFilter::ROBOT.matches(31, 0));
        assert!(!DeviceFilter::ROBOT.matches(31, 4));
        assert!(!DeviceFilter::ROBOT.matches(1, 0));
    }

    #[test]
    fn test_robot_pin() {
        assert_eq!(PairingCredential::ROBOT.pin(), "1234");
    }
}
