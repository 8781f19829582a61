use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use domain::driver::{
    ConnectionState, DeviceFilter, DiscoveredDevice, DriverSettings, PairingCredential, PollTarget,
    Transport, TransportListener, TransportMessage, TransportSession,
};
use domain::event::{DriverEvent, PeripheralHost};
use domain::protocol::{CommandFrame, RobotCommand};
use domain::DomainError;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::decoder::{DecodedMessage, MessageDecoder};
use super::polling::{PollSink, PollingScheduler};
use super::rate_limiter::RateLimiter;

/// Upper bound on closing a session
const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// The session lives outside `Inner` so writes can run without the state lock
type SessionHandle = Arc<Mutex<Box<dyn TransportSession>>>;

/// Result of a send attempt that did not fail at the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the transport session
    Sent,
    /// Dropped: no live session
    NotConnected,
    /// Dropped: the send window is full
    RateLimited,
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

struct Inner {
    state: ConnectionState,
    session: Option<SessionHandle>,
    /// Bumped whenever a session is torn down; callbacks from older
    /// sessions carry a stale value and are ignored
    generation: u64,
    /// Cancelled on teardown; writes still in flight on the old session
    /// give up
    writes: CancellationToken,
    device_id: Option<String>,
    limiter: RateLimiter,
    poller: Option<PollingScheduler>,
}

impl Inner {
    fn is_live(&self) -> bool {
        self.state.is_connected()
            && self.session.as_ref().is_some_and(|session| match session.try_lock() {
                Ok(session) => session.is_connected(),
                // A write holds the session; its result reports a dead link
                Err(_) => true,
            })
    }
}

async fn close_session(session: SessionHandle) {
    let close = async {
        let mut session = session.lock().await;
        session.disconnect().await
    };
    match tokio::time::timeout(SESSION_CLOSE_TIMEOUT, close).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Error closing transport session"),
        Err(_) => warn!(
            timeout_ms = SESSION_CLOSE_TIMEOUT.as_millis() as u64,
            "Timed out closing transport session"
        ),
    }
}

pub(crate) struct Shared {
    me: Weak<Shared>,
    transport: Arc<dyn Transport>,
    pub(crate) settings: DriverSettings,
    inner: Mutex<Inner>,
    current_generation: AtomicU64,
    poll_count: AtomicU64,
    pub(crate) decoder: MessageDecoder,
    host: RwLock<Option<Arc<dyn PeripheralHost>>>,
}

/// Owns the connection to one robot controller.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct ConnectionManager {
    pub(crate) shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, settings: DriverSettings) -> Self {
        let limiter = RateLimiter::new(settings.send_rate_max);
        let shared = Arc::new_cyclic(|me| Shared {
            me: me.clone(),
            transport,
            settings,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                session: None,
                generation: 0,
                writes: CancellationToken::new(),
                device_id: None,
                limiter,
                poller: None,
            }),
            current_generation: AtomicU64::new(0),
            poll_count: AtomicU64::new(0),
            decoder: MessageDecoder::new(),
            host: RwLock::new(None),
        });
        Self { shared }
    }

    /// Register with a host; subsequent events are published to it
    pub fn attach(&self, host: Arc<dyn PeripheralHost>) {
        host.register_peripheral(&self.shared.settings.extension_id);
        match self.shared.host.write() {
            Ok(mut slot) => *slot = Some(host),
            Err(e) => error!(error = %e, "Host slot poisoned"),
        }
        info!(extension_id = %self.shared.settings.extension_id, "Registered with host");
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.shared.settings
    }

    pub fn transport_type(&self) -> &str {
        self.shared.transport.transport_type()
    }

    /// Open a discovery session for robot-class devices, replacing any
    /// existing session
    pub async fn scan(&self) -> Result<(), DomainError> {
        self.shared.scan().await
    }

    /// Pair with and connect to a device found by the current scan.
    ///
    /// When already connected, the current session is closed and a fresh
    /// discovery session opened before pairing with `device_id`.
    pub async fn connect(&self, device_id: &str) -> Result<(), DomainError> {
        self.shared.connect(device_id).await
    }

    pub async fn disconnect(&self) {
        let mut inner = self.shared.inner.lock().await;
        self.shared.teardown(&mut inner, None).await;
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.inner.lock().await.is_live()
    }

    pub async fn state(&self) -> ConnectionState {
        self.shared.inner.lock().await.state
    }

    pub async fn connected_device(&self) -> Option<String> {
        let inner = self.shared.inner.lock().await;
        if inner.is_live() {
            inner.device_id.clone()
        } else {
            None
        }
    }

    /// Hand one frame to the session.
    ///
    /// With `use_limiter` the send counts against the rate window and is
    /// dropped when the window is full. A transport failure tears the
    /// session down.
    pub async fn send(&self, frame: CommandFrame, use_limiter: bool) -> Result<SendOutcome, DomainError> {
        self.shared.send(frame, use_limiter).await
    }

    /// Number of polling ticks taken while connected
    pub fn poll_count(&self) -> u64 {
        self.shared.poll_count.load(Ordering::SeqCst)
    }

    /// Host stop hook: zero the power of every configured motor port.
    ///
    /// Bypasses the rate limiter.
    pub async fn on_stop_all(&self) -> Result<(), DomainError> {
        info!(ports = ?self.shared.settings.stop_ports, "Stopping all motors");
        for port in self.shared.settings.stop_ports.clone() {
            let frame = RobotCommand::MotorPower { port, power: 0 }.to_frame()?;
            match self.shared.send(frame, false).await? {
                SendOutcome::Sent => {}
                outcome => {
                    debug!(port, ?outcome, "Stop frame not sent");
                    break;
                }
            }
        }
        Ok(())
    }
}

impl Shared {
    fn publish(&self, event: DriverEvent) {
        let host = match self.host.read() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        if let Some(host) = host {
            host.publish(event);
        }
    }

    fn set_state(&self, inner: &mut Inner, state: ConnectionState, reason: Option<String>) {
        if inner.state == state {
            return;
        }
        debug!(from = %inner.state, to = %state, "Connection state change");
        inner.state = state;
        self.publish(DriverEvent::state_changed(state, reason));
    }

    fn listener(&self, generation: u64) -> Arc<dyn TransportListener> {
        Arc::new(SessionListener {
            shared: self.me.clone(),
            generation,
        })
    }

    /// Close whatever session exists and return to Disconnected
    async fn teardown(&self, inner: &mut Inner, reason: Option<String>) {
        if let Some(poller) = inner.poller.take() {
            poller.stop();
        }

        std::mem::replace(&mut inner.writes, CancellationToken::new()).cancel();
        if let Some(session) = inner.session.take() {
            close_session(session).await;
        }

        inner.generation += 1;
        self.current_generation
            .store(inner.generation, Ordering::SeqCst);
        inner.limiter.reset();
        inner.device_id = None;

        let abandoned = self.decoder.abandon_pending();
        if abandoned > 0 {
            debug!(abandoned, "Dropped pending reply requests");
        }
        self.decoder.clear_readings();

        if inner.state != ConnectionState::Disconnected {
            match &reason {
                Some(reason) => warn!(reason = %reason, "Disconnected"),
                None => info!("Disconnected"),
            }
        }
        let state = inner.state.to_disconnected();
        self.set_state(inner, state, reason);
    }

    async fn scan(&self) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().await;
        self.teardown(&mut inner, None).await;
        self.open_discovery(&mut inner).await
    }

    /// Open a discovery session on a torn-down `inner`
    async fn open_discovery(&self, inner: &mut Inner) -> Result<(), DomainError> {
        info!(
            transport = self.transport.transport_type(),
            "Scanning for robot controllers"
        );
        let listener = self.listener(inner.generation);
        let session = self
            .transport
            .open_discovery(DeviceFilter::ROBOT, listener)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to open discovery session");
                e
            })?;

        inner.session = Some(Arc::new(Mutex::new(session)));
        let state = inner.state.to_scanning();
        self.set_state(inner, state, None);
        Ok(())
    }

    async fn connect(&self, device_id: &str) -> Result<(), DomainError> {
        let (session, generation) = {
            let mut inner = self.inner.lock().await;
            if inner.state.is_connected() {
                info!(
                    previous = ?inner.device_id,
                    device_id,
                    "Already connected, reconnecting"
                );
                self.teardown(&mut inner, None).await;
                self.open_discovery(&mut inner).await?;
            }

            let next = inner
                .state
                .to_connecting()
                .map_err(|e| DomainError::InvalidState(e.to_string()))?;
            let session = inner
                .session
                .take()
                .ok_or_else(|| DomainError::InvalidState("No discovery session".to_string()))?;
            inner.device_id = Some(device_id.to_string());
            self.set_state(&mut inner, next, None);
            (session, inner.generation)
        };

        info!(device_id, "Connecting");
        let result = {
            let mut session = session.lock().await;
            session
                .connect_peripheral(device_id, &PairingCredential::ROBOT)
                .await
        };

        let mut inner = self.inner.lock().await;
        if inner.generation != generation || inner.state != ConnectionState::Connecting {
            // disconnect() or scan() ran while pairing was in flight
            close_session(session).await;
            return Err(DomainError::Cancelled(format!(
                "Connection to {} was superseded",
                device_id
            )));
        }

        match result {
            Ok(()) => {
                let next = inner
                    .state
                    .to_connected()
                    .map_err(|e| DomainError::InvalidState(e.to_string()))?;
                inner.session = Some(session);
                inner.limiter.reset();
                inner.poller = Some(PollingScheduler::start(
                    self.me.clone(),
                    generation,
                    Duration::from_millis(self.settings.polling_interval_ms),
                    self.settings.poll_targets.clone(),
                ));
                info!(device_id, "Connected");
                self.set_state(&mut inner, next, None);
                Ok(())
            }
            Err(e) => {
                error!(device_id, error = %e, "Connection failed");
                inner.session = Some(session);
                self.teardown(&mut inner, Some(e.to_string())).await;
                Err(e)
            }
        }
    }

    async fn send(&self, frame: CommandFrame, use_limiter: bool) -> Result<SendOutcome, DomainError> {
        let (session, generation, writes) = {
            let mut inner = self.inner.lock().await;

            if !inner.is_live() {
                debug!(bytes = ?frame.as_bytes(), "Not connected, dropping frame");
                return Ok(SendOutcome::NotConnected);
            }
            if use_limiter && !inner.limiter.okay_to_send() {
                debug!(bytes = ?frame.as_bytes(), "Send window full, dropping frame");
                return Ok(SendOutcome::RateLimited);
            }
            let Some(session) = inner.session.clone() else {
                return Ok(SendOutcome::NotConnected);
            };
            (session, inner.generation, inner.writes.clone())
        };

        // The state lock is released here; disconnect() cancels `writes`
        // to pull a stalled write off the session
        let message = TransportMessage::from_bytes(frame.as_bytes());
        let result = tokio::select! {
            biased;
            _ = writes.cancelled() => {
                debug!(bytes = ?frame.as_bytes(), "Session closed during write, dropping frame");
                return Ok(SendOutcome::NotConnected);
            }
            result = async {
                let mut session = session.lock().await;
                session.send_message(message).await
            } => result,
        };

        match result {
            Ok(()) => {
                debug!(bytes = ?frame.as_bytes(), "Frame sent");
                Ok(SendOutcome::Sent)
            }
            Err(e) => {
                error!(error = %e, "Send failed");
                self.handle_connection_lost(generation, e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn handle_connection_lost(&self, generation: u64, reason: String) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return;
        }
        self.teardown(&mut inner, Some(reason)).await;
    }

    fn is_current(&self, generation: u64) -> bool {
        self.current_generation.load(Ordering::SeqCst) == generation
    }
}

#[async_trait]
impl PollSink for Shared {
    async fn begin_tick(&self, session: u64) -> bool {
        let inner = self.inner.lock().await;
        if inner.generation != session || !inner.is_live() {
            return false;
        }
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn refresh(&self, target: PollTarget) {
        let frame = match (RobotCommand::Query {
            command: target.command,
            port: target.port,
        })
        .to_frame()
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!(command = %target.command, error = %e, "Skipping poll target");
                return;
            }
        };

        match self.send(frame, true).await {
            Ok(SendOutcome::Sent) => {}
            Ok(outcome) => debug!(command = %target.command, ?outcome, "Poll request dropped"),
            Err(e) => warn!(command = %target.command, error = %e, "Poll request failed"),
        }
    }
}

/// Transport callbacks for one session generation
struct SessionListener {
    shared: Weak<Shared>,
    generation: u64,
}

impl SessionListener {
    fn current(&self) -> Option<Arc<Shared>> {
        let shared = self.shared.upgrade()?;
        shared.is_current(self.generation).then_some(shared)
    }
}

impl TransportListener for SessionListener {
    fn on_device_discovered(&self, device: DiscoveredDevice) {
        if let Some(shared) = self.current() {
            info!(id = %device.id, name = %device.name, rssi = ?device.rssi, "Device discovered");
            shared.publish(DriverEvent::device_discovered(device));
        }
    }

    fn on_message(&self, message: TransportMessage) {
        let Some(shared) = self.current() else {
            return;
        };
        match shared.decoder.ingest(&message) {
            Ok(DecodedMessage::Reading(reading)) => {
                debug!(command = %reading.command, port = reading.port, value = ?reading.value, "Reading received");
                shared.publish(DriverEvent::reading_updated(reading));
            }
            Ok(DecodedMessage::Unrecognized { .. }) => {}
            Err(e) => warn!(error = %e, "Undecodable inbound message"),
        }
    }

    fn on_connection_lost(&self, reason: String) {
        let Some(shared) = self.current() else {
            return;
        };
        let generation = self.generation;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    shared.handle_connection_lost(generation, reason).await;
                });
            }
            Err(e) => error!(error = %e, reason = %reason, "Connection lost outside a runtime"),
        }
    }
}
