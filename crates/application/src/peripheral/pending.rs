use std::collections::BTreeMap;

use domain::protocol::{CommandId, SensorReading};
use tokio::sync::oneshot;

struct PendingRequest {
    command: CommandId,
    port: u8,
    reply: oneshot::Sender<SensorReading>,
}

/// Outstanding GET_* requests keyed by sequence number.
///
/// Replies carry no request id, so a reply resolves the oldest waiting
/// request with the same command and port.
#[derive(Default)]
pub struct PendingReplies {
    next_seq: u64,
    waiting: BTreeMap<u64, PendingRequest>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        command: CommandId,
        port: u8,
    ) -> (u64, oneshot::Receiver<SensorReading>) {
        // Callers that stopped waiting never get a reply; drop their slots
        self.waiting.retain(|_, p| !p.reply.is_closed());

        let seq = self.next_seq;
        self.next_seq += 1;

        let (reply, rx) = oneshot::channel();
        self.waiting.insert(
            seq,
            PendingRequest {
                command,
                port,
                reply,
            },
        );
        (seq, rx)
    }

    pub fn cancel(&mut self, seq: u64) -> bool {
        self.waiting.remove(&seq).is_some()
    }

    /// Hand `reading` to the oldest matching request. Requests whose caller
    /// already gave up are discarded along the way.
    pub fn resolve(&mut self, reading: &SensorReading) -> Option<u64> {
        loop {
            let seq = self
                .waiting
                .iter()
                .find(|(_, p)| p.command == reading.command && p.port == reading.port)
                .map(|(seq, _)| *seq)?;

            let request = self.waiting.remove(&seq)?;
            if request.reply.send(reading.clone()).is_ok() {
                return Some(seq);
            }
        }
    }

    /// Drop every outstanding request; their callers observe a closed channel
    pub fn clear(&mut self) -> usize {
        let count = self.waiting.len();
        self.waiting.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}
