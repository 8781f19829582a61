mod connection_state;
mod discovery;
mod message;
mod settings;
mod transport;
mod transport_kind;

pub use connection_state::ConnectionState;
pub use discovery::{DeviceFilter, DiscoveredDevice, PairingCredential};
pub use message::{MessageEncoding, TransportMessage};
pub use settings::{DriverSettings, PollTarget};
pub use transport::{Transport, TransportListener, TransportSession};
pub use transport_kind::TransportKind;
