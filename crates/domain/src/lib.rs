//! Domain layer - Pure protocol and driver model with no I/O
//!
//! This crate contains:
//! - Wire protocol (command ids, frames, reply decode table)
//! - Connection state machine
//! - Transport and host ports (traits)
//! - Driver events
//!
//! Principles:
//! - No dependencies on infrastructure
//! - Protocol rules enforced at domain level
//! - Testable in isolation

pub mod driver;
pub mod error;
pub mod event;
pub mod protocol;

// Re-export commonly used types
pub use error::DomainError;
pub use event::{DriverEvent, PeripheralHost};
pub use protocol::{CommandFrame, CommandId, RobotCommand, SensorReading};
