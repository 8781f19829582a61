use domain::driver::DiscoveredDevice;
use domain::{DriverEvent, PeripheralHost};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Host that logs driver events and hands discovered devices to the CLI
pub struct ConsoleHost {
    discovered: mpsc::UnboundedSender<DiscoveredDevice>,
}

impl ConsoleHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DiscoveredDevice>) {
        let (discovered, rx) = mpsc::unbounded_channel();
        (Self { discovered }, rx)
    }
}

impl PeripheralHost for ConsoleHost {
    fn register_peripheral(&self, extension_id: &str) {
        debug!(extension_id, "Peripheral registered");
    }

    fn publish(&self, event: DriverEvent) {
        match event {
            DriverEvent::DeviceDiscovered { device, .. } => {
                // Receiver gone means the CLI stopped listening; nothing to do
                let _ = self.discovered.send(device);
            }
            DriverEvent::ConnectionStateChanged { state, reason, .. } => match reason {
                Some(reason) => info!(%state, %reason, "Connection state changed"),
                None => info!(%state, "Connection state changed"),
            },
            DriverEvent::ReadingUpdated { reading, .. } => {
                info!(
                    command = %reading.command,
                    port = reading.port,
                    value = reading.value.as_f64(),
                    "📡 Reading"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovered_devices_are_forwarded() {
        let (host, mut rx) = ConsoleHost::new();
        host.publish(DriverEvent::device_discovered(DiscoveredDevice::new(
            "sim-robot-01",
            "VietRobot Simulator",
        )));

        let device = rx.try_recv().unwrap();
        assert_eq!(device.id, "sim-robot-01");
        assert!(rx.try_recv().is_err());
    }
}
