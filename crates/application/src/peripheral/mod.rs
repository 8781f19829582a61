//! Driver for one VietRobot controller: connection lifecycle, rate-limited
//! command sending, sensor polling and reply decoding.

mod commands;
mod decoder;
mod manager;
mod pending;
mod polling;
mod rate_limiter;

pub use commands::ReplyHandle;
pub use decoder::{DecodedMessage, InboundFrame, MessageDecoder};
pub use manager::{ConnectionManager, SendOutcome};
pub use pending::PendingReplies;
pub use polling::{PollSink, PollingScheduler};
pub use rate_limiter::RateLimiter;
