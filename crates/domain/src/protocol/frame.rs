use crate::error::{DomainError, Result};

use super::command::CommandId;

/// Bytes occupied by the little-endian length prefix
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Largest payload whose frame length still fits the 16-bit length field
/// (the field also counts the command id byte).
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - 1;

/// One complete wire message.
///
/// ```text
/// offset 0-1: length (u16 LE, = total frame length - 2)
/// offset 2:   command id
/// offset 3+:  sub-opcode and arguments
/// ```
///
/// Frames are immutable; a fresh one is built for every send.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandFrame {
    bytes: Vec<u8>,
}

impl CommandFrame {
    /// Build a frame for `command` carrying `payload`.
    ///
    /// Fails with [`DomainError::EncodingOverflow`] rather than truncating
    /// when the length would not fit in 16 bits.
    pub fn encode(command: CommandId, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(DomainError::EncodingOverflow(payload.len()));
        }

        let len = (payload.len() + 1) as u16;
        let mut bytes = Vec::with_capacity(LENGTH_PREFIX_LEN + 1 + payload.len());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.push(command.as_u8());
        bytes.extend_from_slice(payload);

        Ok(Self { bytes })
    }

    /// Validate a complete frame received from the wire
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LENGTH_PREFIX_LEN + 1 {
            return Err(DomainError::MalformedFrame(format!(
                "Frame too short: {} bytes",
                bytes.len()
            )));
        }

        let declared = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        let actual = bytes.len() - LENGTH_PREFIX_LEN;
        if declared != actual {
            return Err(DomainError::MalformedFrame(format!(
                "Length field says {} bytes, frame carries {}",
                declared, actual
            )));
        }

        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Value of the length field
    pub fn declared_len(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0], self.bytes[1]])
    }

    pub fn command_byte(&self) -> u8 {
        self.bytes[LENGTH_PREFIX_LEN]
    }

    pub fn command(&self) -> Result<CommandId> {
        CommandId::try_from(self.command_byte())
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[LENGTH_PREFIX_LEN + 1..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MotorSubCommand;

    #[test]
    fn test_encode_led_rgb() {
        let frame = CommandFrame::encode(CommandId::PutLedRgb, &[0xFF, 0x00, 0x80]).unwrap();
        assert_eq!(frame.as_bytes(), &[0x04, 0x00, 0x00, 0xFF, 0x00, 0x80]);
        assert_eq!(frame.declared_len(), 4);
        assert_eq!(frame.command(), Ok(CommandId::PutLedRgb));
    }

    #[test]
    fn test_encode_motor_power() {
        let frame = CommandFrame::encode(
            CommandId::PutDcMotor,
            &[MotorSubCommand::PortPower.as_u8(), 0, 75],
        )
        .unwrap();
        assert_eq!(frame.command_byte(), 0x02);
        assert_eq!(frame.payload(), &[0x01, 0x00, 0x4B]);
    }

    #[test]
    fn test_length_field_is_frame_len_minus_two() {
        for command in CommandId::ALL {
            for payload_len in [0usize, 1, 3, 4, 254, 255, 256, 1000] {
                let payload = vec![0xA5; payload_len];
                let frame = CommandFrame::encode(command, &payload).unwrap();
                assert_eq!(frame.declared_len() as usize, frame.len() - 2);
            }
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = CommandFrame::encode(CommandId::PutServo, &[1, 90, 45, 180]).unwrap();
        let b = CommandFrame::encode(CommandId::PutServo, &[1, 90, 45, 180]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_length_high_byte_is_little_endian() {
        // 299 payload bytes + command id = 300 = 0x012C
        let frame = CommandFrame::encode(CommandId::PutLcd, &[0u8; 299]).unwrap();
        assert_eq!(&frame.as_bytes()[..2], &[0x2C, 0x01]);
    }

    #[test]
    fn test_largest_payload_fits() {
        let frame = CommandFrame::encode(CommandId::PutLcd, &vec![0u8; MAX_PAYLOAD_LEN]).unwrap();
        assert_eq!(frame.declared_len(), u16::MAX);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            CommandFrame::encode(CommandId::PutLcd, &payload),
            Err(DomainError::EncodingOverflow(MAX_PAYLOAD_LEN + 1))
        );
    }

    #[test]
    fn test_parse_valid_frame() {
        let frame = CommandFrame::parse(&[0x03, 0x00, 0x0C, 0x01, 0x01]).unwrap();
        assert_eq!(frame.command(), Ok(CommandId::GetButtonState));
        assert_eq!(frame.payload(), &[0x01, 0x01]);
    }

    #[test]
    fn test_parse_rejects_length_mismatch() {
        assert!(matches!(
            CommandFrame::parse(&[0x05, 0x00, 0x0C, 0x01]),
            Err(DomainError::MalformedFrame(_))
        ));
        assert!(matches!(
            CommandFrame::parse(&[0x01, 0x00]),
            Err(DomainError::MalformedFrame(_))
        ));
    }
}
