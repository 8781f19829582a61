//! Application layer - Driver workflows on top of the transport ports

pub mod peripheral;

pub use peripheral::{ConnectionManager, ReplyHandle, SendOutcome};
