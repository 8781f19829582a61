use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Payload of {0} bytes overflows the 16-bit frame length field")]
    EncodingOverflow(usize),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unknown command id: {0:#04x}")]
    UnknownCommand(u8),

    #[error("Pairing failed: {0}")]
    PairingFailed(String),

    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Invalid transport configuration: {0}")]
    InvalidTransportConfig(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
