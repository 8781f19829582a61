use std::sync::Arc;

use async_trait::async_trait;

use super::discovery::{DeviceFilter, DiscoveredDevice, PairingCredential};
use super::message::TransportMessage;
use crate::error::DomainError;

/// Notifications a transport session delivers asynchronously.
///
/// Called from the transport's own tasks, concurrently with any
/// caller-driven send. Implementations must not block.
pub trait TransportListener: Send + Sync {
    /// A device matching the discovery filter was found
    fn on_device_discovered(&self, device: DiscoveredDevice);

    /// One inbound frame arrived from the connected device
    fn on_message(&self, message: TransportMessage);

    /// The session was lost without the driver asking for it
    fn on_connection_lost(&self, reason: String);
}

/// Entry point to a wireless transport (Bluetooth SPP, simulator, ...)
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a discovery session. Devices matching `filter` are reported to
    /// `listener`; the same session is later used to connect.
    async fn open_discovery(
        &self,
        filter: DeviceFilter,
        listener: Arc<dyn TransportListener>,
    ) -> Result<Box<dyn TransportSession>, DomainError>;

    /// Get transport type identifier
    fn transport_type(&self) -> &str;
}

/// A discovery session that can be promoted to a byte-stream session
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Pair with `device_id` using `credential` and open the data channel
    async fn connect_peripheral(
        &mut self,
        device_id: &str,
        credential: &PairingCredential,
    ) -> Result<(), DomainError>;

    /// Deliver one message, in order, exactly once
    async fn send_message(&mut self, message: TransportMessage) -> Result<(), DomainError>;

    /// Close the session. Must be safe to call repeatedly.
    async fn disconnect(&mut self) -> Result<(), DomainError>;

    /// Check if the data channel is open
    fn is_connected(&self) -> bool;
}
