use serde::{Deserialize, Serialize};

use crate::protocol::CommandId;

/// A sensor the polling scheduler refreshes on every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PollTarget {
    pub command: CommandId,
    #[serde(default)]
    pub port: u8,
}

/// Tunables of a peripheral driver instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSettings {
    /// Id the driver registers under with its host
    #[serde(default = "default_extension_id")]
    pub extension_id: String,
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Maximum admitted sends per one-second window
    #[serde(default = "default_send_rate_max")]
    pub send_rate_max: usize,
    /// How long a caller waits for a GET_* reply before giving up
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    #[serde(default)]
    pub poll_targets: Vec<PollTarget>,
    /// Motor ports stopped by the host's stop-all hook
    #[serde(default = "default_stop_ports")]
    pub stop_ports: Vec<u8>,
}

fn default_extension_id() -> String {
    "vietrobot".to_string()
}
fn default_polling_interval_ms() -> u64 {
    500
}
fn default_send_rate_max() -> usize {
    40
}
fn default_reply_timeout_ms() -> u64 {
    1000
}
fn default_stop_ports() -> Vec<u8> {
    vec![0, 1]
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            extension_id: default_extension_id(),
            polling_interval_ms: default_polling_interval_ms(),
            send_rate_max: default_send_rate_max(),
            reply_timeout_ms: default_reply_timeout_ms(),
            poll_targets: Vec::new(),
            stop_ports: default_stop_ports(),
        }
    }
}
