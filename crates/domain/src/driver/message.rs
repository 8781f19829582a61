use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Byte-to-text encoding applied by the transport channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageEncoding {
    #[default]
    Base64,
}

/// A message exchanged with a transport session.
///
/// The payload is text in `encoding`; the driver only ever hands over whole
/// frames, so one message carries exactly one frame's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMessage {
    pub message: String,
    pub encoding: MessageEncoding,
}

impl TransportMessage {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            message: STANDARD.encode(bytes),
            encoding: MessageEncoding::Base64,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self.encoding {
            MessageEncoding::Base64 => STANDARD.decode(&self.message).map_err(|e| {
                DomainError::MalformedFrame(format!("Invalid base64 payload: {}", e))
            }),
        }
    }
}
