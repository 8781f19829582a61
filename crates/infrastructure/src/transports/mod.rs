mod serial;
mod simulator;

pub use serial::{SerialConfig, SerialTransport};
pub use simulator::{SimulatedDevice, SimulatorConfig, SimulatorTransport};

use std::sync::Arc;

use domain::DomainError;
use domain::driver::{Transport, TransportKind};

/// Factory for creating transports
pub struct TransportFactory;

impl TransportFactory {
    /// Create a transport from kind and configuration
    pub fn create_transport(
        kind: TransportKind,
        config: serde_json::Value,
    ) -> Result<Arc<dyn Transport>, DomainError> {
        // A missing config section means "all defaults"
        let config = if config.is_null() {
            serde_json::json!({})
        } else {
            config
        };

        match kind {
            TransportKind::Serial => {
                let serial_config: SerialConfig = serde_json::from_value(config).map_err(|e| {
                    DomainError::InvalidTransportConfig(format!("Invalid serial config: {}", e))
                })?;
                Ok(Arc::new(SerialTransport::new(serial_config)) as Arc<dyn Transport>)
            }
            TransportKind::Simulator => {
                let sim_config: SimulatorConfig = serde_json::from_value(config).map_err(|e| {
                    DomainError::InvalidTransportConfig(format!(
                        "Invalid simulator config: {}",
                        e
                    ))
                })?;
                Ok(Arc::new(SimulatorTransport::new(sim_config)) as Arc<dyn Transport>)
            }
        }
    }
}
