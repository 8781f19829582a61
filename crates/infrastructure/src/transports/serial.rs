use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::DomainError;
use domain::driver::{
    DeviceFilter, DiscoveredDevice, PairingCredential, Transport, TransportKind,
    TransportListener, TransportMessage, TransportSession,
};
use domain::protocol::{FrameAssembler, MAX_REPLY_LEN};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialPortType, SerialStream};
use tokio_util::sync::CancellationToken;

/// Bluetooth SPP serial transport configuration.
///
/// Pairing (and the PIN exchange) happens in the OS Bluetooth stack; the
/// paired controller then shows up as a serial device (`/dev/rfcomm0`,
/// `COM7`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Extra port to offer during discovery, e.g. a manually bound rfcomm device
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

fn default_baud_rate() -> u32 {
    115200
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_read_buffer_size() -> usize {
    256
}

impl SerialConfig {
    pub fn new(port: Option<String>) -> Self {
        Self {
            port,
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            read_buffer_size: default_read_buffer_size(),
        }
    }

    /// Normalize port name for Windows (e.g., COM7 -> \\.\COM7)
    fn native_port_name(port: &str) -> String {
        if cfg!(target_os = "windows") && !port.to_uppercase().starts_with(r"\\.\") {
            format!(r"\\.\{}", port)
        } else {
            port.to_string()
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Serial ports that can carry an SPP link
fn is_bluetooth_port(name: &str, port_type: &SerialPortType) -> bool {
    matches!(port_type, SerialPortType::BluetoothPort) || name.contains("rfcomm")
}

pub struct SerialTransport {
    config: SerialConfig,
}

impl SerialTransport {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }

    fn list_ports(&self) -> Result<Vec<DiscoveredDevice>, DomainError> {
        let ports = tokio_serial::available_ports()
            .map_err(|e| DomainError::TransportError(format!("Failed to list ports: {}", e)))?;

        let mut devices: Vec<DiscoveredDevice> = ports
            .into_iter()
            .filter(|p| is_bluetooth_port(&p.port_name, &p.port_type))
            .map(|p| DiscoveredDevice::new(p.port_name.clone(), p.port_name))
            .collect();

        if let Some(port) = &self.config.port {
            if !devices.iter().any(|d| &d.id == port) {
                devices.push(DiscoveredDevice::new(port.clone(), port.clone()));
            }
        }

        Ok(devices)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open_discovery(
        &self,
        filter: DeviceFilter,
        listener: Arc<dyn TransportListener>,
    ) -> Result<Box<dyn TransportSession>, DomainError> {
        // Class-of-device filtering already happened when the OS paired the
        // device; every SPP port is a candidate.
        tracing::debug!(
            major = filter.major_device_class,
            minor = filter.minor_device_class,
            "Listing Bluetooth serial ports"
        );

        for device in self.list_ports()? {
            listener.on_device_discovered(device);
        }

        Ok(Box::new(SerialSession {
            config: self.config.clone(),
            listener,
            writer: None,
            reader: None,
            cancel_token: CancellationToken::new(),
        }))
    }

    fn transport_type(&self) -> &str {
        TransportKind::Serial.as_str()
    }
}

struct SerialSession {
    config: SerialConfig,
    listener: Arc<dyn TransportListener>,
    writer: Option<WriteHalf<SerialStream>>,
    reader: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl SerialSession {
    fn spawn_reader(&mut self, mut read_half: ReadHalf<SerialStream>, port_name: String) {
        let listener = self.listener.clone();
        let cancel_token = self.cancel_token.clone();
        let buffer_size = self.config.read_buffer_size.max(16);

        self.reader = Some(tokio::spawn(async move {
            let mut assembler = FrameAssembler::with_max_len(MAX_REPLY_LEN);
            let mut buffer = vec![0u8; buffer_size];

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    read = read_half.read(&mut buffer) => match read {
                        Ok(0) => {
                            tracing::warn!(port = %port_name, "Serial port closed by peer");
                            listener.on_connection_lost("serial port closed".to_string());
                            break;
                        }
                        Ok(n) => {
                            let discarded = assembler.discarded();
                            assembler.push(&buffer[..n]);
                            while let Some(frame) = assembler.next_frame() {
                                listener.on_message(TransportMessage::from_bytes(&frame));
                            }
                            if assembler.discarded() > discarded {
                                tracing::debug!(
                                    port = %port_name,
                                    bytes = assembler.discarded() - discarded,
                                    "Skipped unframed bytes"
                                );
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                        Err(e) => {
                            tracing::warn!(port = %port_name, error = %e, "Serial read failed");
                            listener.on_connection_lost(format!("read error: {}", e));
                            break;
                        }
                    }
                }
            }
        }));
    }
}

#[async_trait]
impl TransportSession for SerialSession {
    async fn connect_peripheral(
        &mut self,
        device_id: &str,
        credential: &PairingCredential,
    ) -> Result<(), DomainError> {
        let port_name = SerialConfig::native_port_name(device_id);

        tracing::debug!(
            port = %port_name,
            baud_rate = self.config.baud_rate,
            pin_len = credential.pin().len(),
            "Opening SPP serial port (pairing handled by the OS)"
        );

        let stream = tokio_serial::new(&port_name, self.config.baud_rate)
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .open_native_async()
            .map_err(|e| {
                tracing::warn!(port = %port_name, error = %e, "Failed to open serial port");
                DomainError::ConnectFailed(format!(
                    "Failed to open serial port {}: {}. Tip: make sure the robot is paired and the port is not used by another application.",
                    port_name, e
                ))
            })?;

        let (read_half, write_half) = tokio::io::split(stream);
        self.cancel_token = CancellationToken::new();
        self.writer = Some(write_half);
        self.spawn_reader(read_half, port_name.clone());

        tracing::debug!(port = %port_name, "Serial port opened successfully");
        Ok(())
    }

    async fn send_message(&mut self, message: TransportMessage) -> Result<(), DomainError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| DomainError::TransportError("Port not connected".to_string()))?;

        let data = message.to_bytes()?;

        writer
            .write_all(&data)
            .await
            .map_err(|e| DomainError::TransportError(format!("Write error: {}", e)))?;

        writer
            .flush()
            .await
            .map_err(|e| DomainError::TransportError(format!("Flush error: {}", e)))?;

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DomainError> {
        self.cancel_token.cancel();

        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::warn!(error = %e, "Error shutting down serial port");
            }
        }

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some() && !self.cancel_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullListener;

    impl TransportListener for NullListener {
        fn on_device_discovered(&self, _device: DiscoveredDevice) {}
        fn on_message(&self, _message: TransportMessage) {}
        fn on_connection_lost(&self, _reason: String) {}
    }

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::default();
        assert_eq!(config.port, None);
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.timeout_ms, 1000);
        assert_eq!(config.read_buffer_size, 256);
    }

    #[test]
    fn test_serial_config_from_json() {
        let config: SerialConfig =
            serde_json::from_value(serde_json::json!({ "port": "/dev/rfcomm0", "baud_rate": 9600 }))
                .unwrap();
        assert_eq!(config.port.as_deref(), Some("/dev/rfcomm0"));
        assert_eq!(config.baud_rate, 9600);
    }

    #[test]
    fn test_bluetooth_port_detection() {
        assert!(is_bluetooth_port("/dev/rfcomm0", &SerialPortType::Unknown));
        assert!(is_bluetooth_port("COM7", &SerialPortType::BluetoothPort));
        assert!(!is_bluetooth_port("/dev/ttyS0", &SerialPortType::Unknown));
    }

    #[test]
    fn test_serial_transport_type() {
        let transport = SerialTransport::new(SerialConfig::default());
        assert_eq!(transport.transport_type(), "serial");
    }

    #[tokio::test]
    async fn test_send_without_connection_fails() {
        let mut session = SerialSession {
            config: SerialConfig::default(),
            listener: Arc::new(NullListener),
            writer: None,
            reader: None,
            cancel_token: CancellationToken::new(),
        };

        assert!(!session.is_connected());
        let result = session
            .send_message(TransportMessage::from_bytes(&[0x01, 0x00, 0x06]))
            .await;
        assert!(matches!(result, Err(DomainError::TransportError(_))));
    }

    #[tokio::test]
    async fn test_disconnect_without_connection() {
        let mut session = SerialSession {
            config: SerialConfig::default(),
            listener: Arc::new(NullListener),
            writer: None,
            reader: None,
            cancel_token: CancellationToken::new(),
        };

        // Should be able to disconnect even if not connected
        assert!(session.disconnect().await.is_ok());
        assert!(!session.is_connected());
    }
}
