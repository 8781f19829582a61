use serde::{Deserialize, Serialize};

/// Connection state of a peripheral driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No transport session
    #[default]
    Disconnected,
    /// Discovery session open, waiting for the caller to pick a device
    Scanning,
    /// Pairing and opening the byte-stream session
    Connecting,
    /// Session established and operational
    Connected,
}

impl ConnectionState {
    /// Check if state allows a connection attempt
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Scanning)
    }

    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if in a transitional state
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Scanning | Self::Connecting)
    }

    /// Transition to scanning state. A new scan is always allowed; any
    /// existing session is torn down by the caller first.
    pub fn to_scanning(&self) -> Self {
        Self::Scanning
    }

    /// Transition to connecting state
    pub fn to_connecting(&self) -> Result<Self, &'static str> {
        match self {
            Self::Scanning => Ok(Self::Connecting),
            _ => Err("Can only connect from Scanning state"),
        }
    }

    /// Transition to connected state
    pub fn to_connected(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connecting => Ok(Self::Connected),
            _ => Err("Can only complete connection from Connecting state"),
        }
    }

    /// Transition to disconnected state
    pub fn to_disconnected(&self) -> Self {
        Self::Disconnected
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_disconnected() {
        let state = ConnectionState::default();
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(!state.can_connect());
        assert!(!state.is_connected());
    }

    #[test]
    fn test_scan_then_connect_then_connected() {
        let state = ConnectionState::Disconnected.to_scanning();
        assert!(state.is_transitioning());
        assert!(state.can_connect());

        let state = state.to_connecting().unwrap();
        assert_eq!(state, ConnectionState::Connecting);

        let state = state.to_connected().unwrap();
        assert!(state.is_connected());
        assert!(!state.is_transitioning());
    }

    #[test]
    fn test_cannot_connect_without_scan() {
        assert!(ConnectionState::Disconnected.to_connecting().is_err());
        assert!(ConnectionState::Connected.to_connecting().is_err());
        assert!(ConnectionState::Connecting.to_connecting().is_err());
    }

    #[test]
    fn test_cannot_complete_connection_from_scanning() {
        assert!(ConnectionState::Scanning.to_connected().is_err());
        assert!(ConnectionState::Disconnected.to_connected().is_err());
    }

    #[test]
    fn test_rescan_from_any_state() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Scanning,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ] {
            assert_eq!(state.to_scanning(), ConnectionState::Scanning);
        }
    }

    #[test]
    fn test_to_disconnected_from_any_state() {
        assert_eq!(
            ConnectionState::Connected.to_disconnected(),
            ConnectionState::Disconnected
        );
        assert_eq!(
            ConnectionState::Connecting.to_disconnected(),
            ConnectionState::Disconnected
        );
        assert_eq!(
            ConnectionState::Scanning.to_disconnected(),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Scanning.to_string(), "scanning");
    }
}
