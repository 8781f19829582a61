use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod host;
pub use host::PeripheralHost;
#[cfg(test)]
pub use host::MockPeripheralHost;

use crate::driver::{ConnectionState, DiscoveredDevice};
use crate::protocol::SensorReading;

/// Events a peripheral driver reports to its host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DriverEvent {
    /// A discovery session found an eligible device
    DeviceDiscovered {
        device: DiscoveredDevice,
        timestamp: DateTime<Utc>,
    },

    /// The driver moved to a new connection state
    ConnectionStateChanged {
        state: ConnectionState,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A GET_* reply was decoded
    ReadingUpdated {
        reading: SensorReading,
        timestamp: DateTime<Utc>,
    },
}

impl DriverEvent {
    /// Create a DeviceDiscovered event
    pub fn device_discovered(device: DiscoveredDevice) -> Self {
        Self::DeviceDiscovered {
            device,
            timestamp: Utc::now(),
        }
    }

    /// Create a ConnectionStateChanged event
    pub fn state_changed(state: ConnectionState, reason: Option<String>) -> Self {
        Self::ConnectionStateChanged {
            state,
            reason,
            timestamp: Utc::now(),
        }
    }

    /// Create a ReadingUpdated event
    pub fn reading_updated(reading: SensorReading) -> Self {
        Self::ReadingUpdated {
            reading,
            timestamp: Utc::now(),
        }
    }

    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::DeviceDiscovered { timestamp, .. } => *timestamp,
            Self::ConnectionStateChanged { timestamp, .. } => *timestamp,
            Self::ReadingUpdated { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &str {
        match self {
            Self::DeviceDiscovered { .. } => "DeviceDiscovered",
            Self::ConnectionStateChanged { .. } => "ConnectionStateChanged",
            Self::ReadingUpdated { .. } => "ReadingUpdated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CommandId, SensorValue};

    #[test]
    fn test_device_discovered_event() {
        let device = DiscoveredDevice::new("00:11:22:33:44:55", "VietRobot");
        let event = DriverEvent::device_discovered(device.clone());

        assert_eq!(event.event_type(), "DeviceDiscovered");
        match event {
            DriverEvent::DeviceDiscovered { device: d, .. } => assert_eq!(d, device),
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_state_changed_event() {
        let event = DriverEvent::state_changed(
            ConnectionState::Disconnected,
            Some("link lost".to_string()),
        );

        assert_eq!(event.event_type(), "ConnectionStateChanged");
        match event {
            DriverEvent::ConnectionStateChanged { state, reason, .. } => {
                assert_eq!(state, ConnectionState::Disconnected);
                assert_eq!(reason.as_deref(), Some("link lost"));
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_serialization() {
        let reading = SensorReading::new(CommandId::GetUltrasonic, 0, SensorValue::Unsigned(42));
        let event = DriverEvent::reading_updated(reading);

        let json_str = serde_json::to_string(&event).unwrap();
        assert!(json_str.contains("\"type\":\"ReadingUpdated\""));
        assert!(json_str.contains("GET_ULTRASONIC"));

        let deserialized: DriverEvent = serde_json::from_str(&json_str).unwrap();
        assert_eq!(deserialized.event_type(), "ReadingUpdated");
    }
}
