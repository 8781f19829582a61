use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

use super::command::CommandId;
use super::frame::CommandFrame;

/// Shape of the value carried by a GET_* reply.
///
/// Replies mirror requests: `[len, len, command id, port, value...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyLayout {
    /// One byte, non-zero = true
    Flag,
    /// u16 little-endian
    Unsigned16,
    /// i16 little-endian
    Signed16,
}

/// Largest length field a reply can declare: command id, port, widest value
pub const MAX_REPLY_LEN: usize = 2 + ReplyLayout::MAX_VALUE_LEN;

impl ReplyLayout {
    pub const MAX_VALUE_LEN: usize = 2;

    pub fn value_len(self) -> usize {
        match self {
            Self::Flag => 1,
            Self::Unsigned16 | Self::Signed16 => 2,
        }
    }

    /// Decode table for the GET_* family. `None` for commands without a reply.
    pub fn for_command(command: CommandId) -> Option<Self> {
        match command {
            CommandId::GetUltrasonic => Some(Self::Unsigned16),
            CommandId::GetGas => Some(Self::Unsigned16),
            CommandId::GetPhotoresistor => Some(Self::Unsigned16),
            CommandId::GetTemperature => Some(Self::Signed16),
            CommandId::GetIrSensor => Some(Self::Flag),
            CommandId::GetVariableResistor => Some(Self::Unsigned16),
            CommandId::GetButtonState => Some(Self::Flag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Flag(bool),
    Unsigned(u16),
    Signed(i16),
}

impl SensorValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Flag(v) => f64::from(u8::from(*v)),
            Self::Unsigned(v) => f64::from(*v),
            Self::Signed(v) => f64::from(*v),
        }
    }

    fn to_le_bytes(self) -> Vec<u8> {
        match self {
            Self::Flag(v) => vec![u8::from(v)],
            Self::Unsigned(v) => v.to_le_bytes().to_vec(),
            Self::Signed(v) => v.to_le_bytes().to_vec(),
        }
    }

    fn matches(&self, layout: ReplyLayout) -> bool {
        matches!(
            (self, layout),
            (Self::Flag(_), ReplyLayout::Flag)
                | (Self::Unsigned(_), ReplyLayout::Unsigned16)
                | (Self::Signed(_), ReplyLayout::Signed16)
        )
    }
}

/// A decoded GET_* reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub command: CommandId,
    pub port: u8,
    pub value: SensorValue,
    pub received_at: DateTime<Utc>,
}

impl SensorReading {
    pub fn new(command: CommandId, port: u8, value: SensorValue) -> Self {
        Self {
            command,
            port,
            value,
            received_at: Utc::now(),
        }
    }

    /// Interpret a reply frame using the decode table
    pub fn decode(frame: &CommandFrame) -> Result<Self> {
        let command = frame.command()?;
        let layout = ReplyLayout::for_command(command).ok_or_else(|| {
            DomainError::MalformedFrame(format!("{} does not carry a reply", command))
        })?;

        let payload = frame.payload();
        let expected = 1 + layout.value_len();
        if payload.len() < expected {
            return Err(DomainError::MalformedFrame(format!(
                "{} reply needs {} payload bytes, got {}",
                command,
                expected,
                payload.len()
            )));
        }

        let port = payload[0];
        let value = match layout {
            ReplyLayout::Flag => SensorValue::Flag(payload[1] != 0),
            ReplyLayout::Unsigned16 => {
                SensorValue::Unsigned(u16::from_le_bytes([payload[1], payload[2]]))
            }
            ReplyLayout::Signed16 => {
                SensorValue::Signed(i16::from_le_bytes([payload[1], payload[2]]))
            }
        };

        Ok(Self::new(command, port, value))
    }

    /// Inverse of [`SensorReading::decode`]; what the controller sends back
    pub fn encode(&self) -> Result<CommandFrame> {
        let layout = ReplyLayout::for_command(self.command).ok_or_else(|| {
            DomainError::MalformedFrame(format!("{} does not carry a reply", self.command))
        })?;
        if !self.value.matches(layout) {
            return Err(DomainError::MalformedFrame(format!(
                "{:?} does not fit the {} reply layout",
                self.value, self.command
            )));
        }

        let mut payload = vec![self.port];
        payload.extend(self.value.to_le_bytes());
        CommandFrame::encode(self.command, &payload)
    }
}
