//! TOML file configuration structures.
//!
//! These structs directly map to the `donlog-config.toml` file format.

use donlog_core::delta::DecreasePolicy;
use serde::Deserialize;
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub sink: SinkConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Engine tuning section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// How to interpret counters that decreased since the last snapshot.
    #[serde(default)]
    pub decrease_policy: DecreasePolicy,
    /// Maximum unreported events fetched per broadcast sweep.
    #[serde(default = "default_poll_limit")]
    pub broadcast_poll_limit: i64,
    /// Delivery attempts per (event, channel) pair within one sweep.
    #[serde(default = "default_max_attempts")]
    pub max_delivery_attempts: u32,
    /// Seconds between periodic broadcast sweeps.
    #[serde(default = "default_sweep_secs")]
    pub broadcast_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decrease_policy: DecreasePolicy::default(),
            broadcast_poll_limit: default_poll_limit(),
            max_delivery_attempts: default_max_attempts(),
            broadcast_interval_secs: default_sweep_secs(),
        }
    }
}

fn default_poll_limit() -> i64 {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_sweep_secs() -> u64 {
    30
}

/// Notification sink section.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Webhook endpoint notifications are posted to.
    pub endpoint: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_sink_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_sink_timeout_secs() -> u64 {
    30
}
