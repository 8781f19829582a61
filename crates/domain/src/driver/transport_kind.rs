use serde::{Deserialize, Serialize};

/// Type of transport used to reach the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Bluetooth serial-port profile exposed by the OS as a serial device
    Serial,
    /// In-process simulated robot
    Simulator,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Simulator => "simulator",
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "simulator" | "sim" => Ok(Self::Simulator),
            other => Err(format!("unknown transport kind: {other}")),
        }
    }
}
