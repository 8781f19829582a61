use super::DriverEvent;

/// The runtime a peripheral driver is attached to (an editor, a CLI, ...).
///
/// Calls arrive from transport tasks as well as caller tasks, so
/// implementations must be cheap and non-blocking.
#[cfg_attr(test, mockall::automock)]
pub trait PeripheralHost: Send + Sync {
    /// Announce the driver under its extension id
    fn register_peripheral(&self, extension_id: &str);

    /// Receive discovered devices, state changes and readings
    fn publish(&self, event: DriverEvent);
}
