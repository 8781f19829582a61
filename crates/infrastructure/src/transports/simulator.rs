use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use domain::DomainError;
use domain::driver::{
    DeviceFilter, DiscoveredDevice, PairingCredential, Transport, TransportKind,
    TransportListener, TransportMessage, TransportSession,
};
use domain::protocol::{CommandFrame, CommandId, ReplyLayout, SensorReading, SensorValue};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// A robot the simulator advertises during discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedDevice {
    pub id: String,
    pub name: String,
    #[serde(default = "default_major_device_class")]
    pub major_device_class: u8,
    #[serde(default)]
    pub minor_device_class: u8,
    #[serde(default)]
    pub rssi: Option<i16>,
}

impl SimulatedDevice {
    pub fn robot(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            major_device_class: default_major_device_class(),
            minor_device_class: 0,
            rssi: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_devices")]
    pub devices: Vec<SimulatedDevice>,
    /// PIN the simulated robot accepts
    #[serde(default = "default_pin")]
    pub pin: String,
    #[serde(default = "default_discovery_delay_ms")]
    pub discovery_delay_ms: u64,
    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,
    #[serde(default = "default_reply_delay_ms")]
    pub reply_delay_ms: u64,
    #[serde(default = "default_min_value")]
    pub min_value: f64,
    #[serde(default = "default_max_value")]
    pub max_value: f64,
    #[serde(default = "default_reply_to_queries")]
    pub reply_to_queries: bool,
}

fn default_major_device_class() -> u8 {
    DeviceFilter::ROBOT.major_device_class
}
fn default_devices() -> Vec<SimulatedDevice> {
    vec![SimulatedDevice::robot("sim-robot-01", "VietRobot Simulator")]
}
fn default_pin() -> String {
    PairingCredential::ROBOT.pin().to_string()
}
fn default_discovery_delay_ms() -> u64 {
    20
}
fn default_connect_delay_ms() -> u64 {
    50
}
fn default_reply_delay_ms() -> u64 {
    10
}
fn default_min_value() -> f64 {
    5.0
}
fn default_max_value() -> f64 {
    200.0
}
fn default_reply_to_queries() -> bool {
    true
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            devices: default_devices(),
            pin: default_pin(),
            discovery_delay_ms: default_discovery_delay_ms(),
            connect_delay_ms: default_connect_delay_ms(),
            reply_delay_ms: default_reply_delay_ms(),
            min_value: default_min_value(),
            max_value: default_max_value(),
            reply_to_queries: default_reply_to_queries(),
        }
    }
}

struct ActiveLink {
    listener: Arc<dyn TransportListener>,
    connected: Arc<AtomicBool>,
}

/// State shared between the transport handle and its sessions
#[derive(Default)]
struct SimulatorLink {
    delivered: Mutex<Vec<Vec<u8>>>,
    active: Mutex<Option<ActiveLink>>,
}

/// In-process robot controller.
///
/// Records every delivered frame and answers GET_* requests with
/// sine-wave readings, so the driver can run without hardware.
pub struct SimulatorTransport {
    config: SimulatorConfig,
    link: Arc<SimulatorLink>,
}

impl SimulatorTransport {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            link: Arc::new(SimulatorLink::default()),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Frames delivered to the robot so far, oldest first
    pub fn delivered_frames(&self) -> Vec<Vec<u8>> {
        match self.link.delivered.lock() {
            Ok(frames) => frames.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Simulate the robot going out of range (battery pulled, link dropped)
    pub fn drop_link(&self, reason: &str) {
        let active = match self.link.active.lock() {
            Ok(mut active) => active.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(active) = active {
            active.connected.store(false, Ordering::SeqCst);
            tracing::info!(reason, "Simulator link dropped");
            active.listener.on_connection_lost(reason.to_string());
        }
    }
}

#[async_trait]
impl Transport for SimulatorTransport {
    async fn open_discovery(
        &self,
        filter: DeviceFilter,
        listener: Arc<dyn TransportListener>,
    ) -> Result<Box<dyn TransportSession>, DomainError> {
        let eligible: Vec<DiscoveredDevice> = self
            .config
            .devices
            .iter()
            .filter(|d| filter.matches(d.major_device_class, d.minor_device_class))
            .map(|d| {
                let device = DiscoveredDevice::new(d.id.clone(), d.name.clone());
                match d.rssi {
                    Some(rssi) => device.with_rssi(rssi),
                    None => device,
                }
            })
            .collect();

        tracing::debug!(
            eligible = eligible.len(),
            advertised = self.config.devices.len(),
            "Simulator discovery opened"
        );

        let delay = Duration::from_millis(self.config.discovery_delay_ms);
        let discovery_listener = listener.clone();
        let reported = eligible.clone();
        let discovery = tokio::spawn(async move {
            sleep(delay).await;
            for device in reported {
                discovery_listener.on_device_discovered(device);
            }
        });

        Ok(Box::new(SimulatorSession {
            config: self.config.clone(),
            eligible,
            listener,
            link: self.link.clone(),
            connected: Arc::new(AtomicBool::new(false)),
            start_time: Instant::now(),
            discovery: Some(discovery),
        }))
    }

    fn transport_type(&self) -> &str {
        TransportKind::Simulator.as_str()
    }
}

struct SimulatorSession {
    config: SimulatorConfig,
    eligible: Vec<DiscoveredDevice>,
    listener: Arc<dyn TransportListener>,
    link: Arc<SimulatorLink>,
    connected: Arc<AtomicBool>,
    start_time: Instant,
    discovery: Option<JoinHandle<()>>,
}

impl SimulatorSession {
    fn generate_value(&self, layout: ReplyLayout) -> SensorValue {
        let elapsed = self.start_time.elapsed().as_secs_f64();

        let range = self.config.max_value - self.config.min_value;
        let midpoint = self.config.min_value + (range / 2.0);
        let amplitude = range / 2.0;

        // Sine wave: period 10 seconds
        let frequency = 0.1;
        let raw_value =
            midpoint + amplitude * (elapsed * frequency * 2.0 * std::f64::consts::PI).sin();

        match layout {
            ReplyLayout::Flag => SensorValue::Flag(raw_value > midpoint),
            ReplyLayout::Unsigned16 => {
                SensorValue::Unsigned(raw_value.round().clamp(0.0, f64::from(u16::MAX)) as u16)
            }
            ReplyLayout::Signed16 => SensorValue::Signed(
                raw_value
                    .round()
                    .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16,
            ),
        }
    }

    fn reply_for(&self, frame: &CommandFrame) -> Option<CommandFrame> {
        let command = frame.command().ok()?;
        let layout = ReplyLayout::for_command(command)?;
        let port = frame.payload().first().copied().unwrap_or(0);
        let reading = SensorReading::new(command, port, self.generate_value(layout));
        match reading.encode() {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::warn!(command = %command, error = %e, "Simulator could not build reply");
                None
            }
        }
    }

    fn record(&self, bytes: Vec<u8>) {
        match self.link.delivered.lock() {
            Ok(mut frames) => frames.push(bytes),
            Err(poisoned) => poisoned.into_inner().push(bytes),
        }
    }
}

#[async_trait]
impl TransportSession for SimulatorSession {
    async fn connect_peripheral(
        &mut self,
        device_id: &str,
        credential: &PairingCredential,
    ) -> Result<(), DomainError> {
        sleep(Duration::from_millis(self.config.connect_delay_ms)).await;

        if !self.eligible.iter().any(|d| d.id == device_id) {
            return Err(DomainError::ConnectFailed(format!(
                "Device {} is not reachable",
                device_id
            )));
        }

        if credential.pin() != self.config.pin {
            return Err(DomainError::PairingFailed(format!(
                "Device {} rejected the PIN",
                device_id
            )));
        }

        self.connected.store(true, Ordering::SeqCst);
        let mut active = self
            .link
            .active
            .lock()
            .map_err(|_| DomainError::TransportError("Simulator link poisoned".to_string()))?;
        *active = Some(ActiveLink {
            listener: self.listener.clone(),
            connected: self.connected.clone(),
        });

        tracing::info!(device_id, "Simulator connected");
        Ok(())
    }

    async fn send_message(&mut self, message: TransportMessage) -> Result<(), DomainError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DomainError::TransportError(
                "Simulator session not connected".to_string(),
            ));
        }

        let bytes = message.to_bytes()?;
        let frame = CommandFrame::parse(&bytes);
        self.record(bytes);

        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                // A real controller silently discards garbage
                tracing::warn!(error = %e, "Simulator received malformed frame");
                return Ok(());
            }
        };

        if !self.config.reply_to_queries || !frame.command().is_ok_and(CommandId::is_query) {
            return Ok(());
        }

        if let Some(reply) = self.reply_for(&frame) {
            let listener = self.listener.clone();
            let connected = self.connected.clone();
            let delay = Duration::from_millis(self.config.reply_delay_ms);
            tokio::spawn(async move {
                sleep(delay).await;
                if connected.load(Ordering::SeqCst) {
                    listener.on_message(TransportMessage::from_bytes(reply.as_bytes()));
                }
            });
        }

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DomainError> {
        if let Some(discovery) = self.discovery.take() {
            discovery.abort();
        }

        if self.connected.swap(false, Ordering::SeqCst) {
            if let Ok(mut active) = self.link.active.lock() {
                *active = None;
            }
            tracing::info!("Simulator disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
