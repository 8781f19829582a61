use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use domain::DomainError;
use domain::driver::TransportMessage;
use domain::protocol::{CommandFrame, CommandId, SensorReading};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, trace, warn};

use super::pending::PendingReplies;

const INBOUND_CHANNEL_CAPACITY: usize = 64;

/// Raw bytes received from the controller, before interpretation
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub bytes: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

/// What an inbound message turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    Reading(SensorReading),
    /// Bytes that are not a recognised reply; kept for subscribers only
    Unrecognized { bytes: Vec<u8>, reason: String },
}

/// Interprets inbound transport messages.
///
/// Every message is forwarded raw to subscribers. GET_* replies are decoded,
/// cached per (command, port) and handed to whoever is waiting for them.
pub struct MessageDecoder {
    readings: DashMap<(CommandId, u8), SensorReading>,
    pending: Mutex<PendingReplies>,
    inbound: broadcast::Sender<InboundFrame>,
}

impl MessageDecoder {
    pub fn new() -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_CHANNEL_CAPACITY);
        Self {
            readings: DashMap::new(),
            pending: Mutex::new(PendingReplies::new()),
            inbound,
        }
    }

    pub fn ingest(&self, message: &TransportMessage) -> Result<DecodedMessage, DomainError> {
        let bytes = message.to_bytes()?;
        trace!(bytes = ?bytes, "Inbound message");

        // No subscribers is not an error
        let _ = self.inbound.send(InboundFrame {
            bytes: bytes.clone(),
            received_at: Utc::now(),
        });

        let reading = CommandFrame::parse(&bytes).and_then(|frame| SensorReading::decode(&frame));
        let reading = match reading {
            Ok(reading) => reading,
            Err(e) => {
                debug!(error = %e, "Ignoring inbound frame");
                return Ok(DecodedMessage::Unrecognized {
                    bytes,
                    reason: e.to_string(),
                });
            }
        };

        self.readings
            .insert((reading.command, reading.port), reading.clone());

        match self.pending.lock() {
            Ok(mut pending) => {
                if let Some(seq) = pending.resolve(&reading) {
                    trace!(seq, command = %reading.command, "Reply matched pending request");
                }
            }
            Err(e) => warn!(error = %e, "Pending reply table poisoned"),
        }

        Ok(DecodedMessage::Reading(reading))
    }

    pub fn latest(&self, command: CommandId, port: u8) -> Option<SensorReading> {
        self.readings.get(&(command, port)).map(|r| r.value().clone())
    }

    /// Forget cached readings, e.g. when the session they came from ends
    pub fn clear_readings(&self) {
        self.readings.clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InboundFrame> {
        self.inbound.subscribe()
    }

    pub fn expect_reply(
        &self,
        command: CommandId,
        port: u8,
    ) -> Result<(u64, oneshot::Receiver<SensorReading>), DomainError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|e| DomainError::InvalidState(format!("Pending reply table poisoned: {}", e)))?;
        Ok(pending.register(command, port))
    }

    pub fn cancel_reply(&self, seq: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.cancel(seq);
        }
    }

    /// Fail every outstanding request, e.g. when the session goes away
    pub fn abandon_pending(&self) -> usize {
        match self.pending.lock() {
            Ok(mut pending) => pending.clear(),
            Err(_) => 0,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::protocol::SensorValue;

    fn reply(command: CommandId, port: u8, value: SensorValue) -> TransportMessage {
        let frame = SensorReading::new(command, port, value).encode().unwrap();
        TransportMessage::from_bytes(frame.as_bytes())
    }

    #[test]
    fn test_reply_is_cached() {
        let decoder = MessageDecoder::new();
        let message = reply(CommandId::GetUltrasonic, 1, SensorValue::Unsigned(321));

        let decoded = decoder.ingest(&message).unwrap();
        assert!(matches!(decoded, DecodedMessage::Reading(ref r) if r.port == 1));

        let latest = decoder.latest(CommandId::GetUltrasonic, 1).unwrap();
        assert_eq!(latest.value, SensorValue::Unsigned(321));
        assert!(decoder.latest(CommandId::GetUltrasonic, 0).is_none());
    }

    #[test]
    fn test_newer_reply_replaces_cached_value() {
        let decoder = MessageDecoder::new();
        decoder
            .ingest(&reply(CommandId::GetTemperature, 0, SensorValue::Signed(-5)))
            .unwrap();
        decoder
            .ingest(&reply(CommandId::GetTemperature, 0, SensorValue::Signed(21)))
            .unwrap();

        let latest = decoder.latest(CommandId::GetTemperature, 0).unwrap();
        assert_eq!(latest.value, SensorValue::Signed(21));
    }

    #[test]
    fn test_unrecognized_bytes_are_forwarded_raw() {
        let decoder = MessageDecoder::new();
        let mut inbound = decoder.subscribe();

        // PUT_LED_RGB echo: valid frame, but not a reply
        let message = TransportMessage::from_bytes(&[0x04, 0x00, 0x00, 0x01, 0x02, 0x03]);
        let decoded = decoder.ingest(&message).unwrap();

        assert!(matches!(decoded, DecodedMessage::Unrecognized { .. }));
        let frame = inbound.try_recv().unwrap();
        assert_eq!(frame.bytes, vec![0x04, 0x00, 0x00, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_invalid_base64_is_an_error() {
        let decoder = MessageDecoder::new();
        let message = TransportMessage {
            message: "not base64!".to_string(),
            encoding: domain::driver::MessageEncoding::Base64,
        };
        assert!(matches!(
            decoder.ingest(&message),
            Err(DomainError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_reply_resolves_waiting_request() {
        let decoder = MessageDecoder::new();
        let (_seq, mut rx) = decoder.expect_reply(CommandId::GetButtonState, 2).unwrap();
        assert_eq!(decoder.pending_count(), 1);

        decoder
            .ingest(&reply(CommandId::GetButtonState, 2, SensorValue::Flag(true)))
            .unwrap();

        assert_eq!(rx.try_recv().unwrap().value, SensorValue::Flag(true));
        assert_eq!(decoder.pending_count(), 0);
    }

    #[test]
    fn test_abandon_pending_closes_waiters() {
        let decoder = MessageDecoder::new();
        let (_seq, mut rx) = decoder.expect_reply(CommandId::GetGas, 0).unwrap();

        assert_eq!(decoder.abandon_pending(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_clear_readings_empties_the_cache() {
        let decoder = MessageDecoder::new();
        decoder
            .ingest(&reply(CommandId::GetPhotoresistor, 3, SensorValue::Unsigned(812)))
            .unwrap();
        assert!(decoder.latest(CommandId::GetPhotoresistor, 3).is_some());

        decoder.clear_readings();
        assert!(decoder.latest(CommandId::GetPhotoresistor, 3).is_none());
    }
}
