//! Infrastructure layer - Transports and configuration

pub mod config;
pub mod transports;

pub use transports::TransportFactory;
