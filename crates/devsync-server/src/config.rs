//! Server configuration.

use std::time::Duration;

use devsync_settings::DevsyncSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the devsync server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Origins allowed by CORS. Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Outbound frames buffered per connection before eviction.
    pub queue_capacity: usize,
    /// Seconds between server pings.
    pub ping_interval_secs: u64,
    /// Seconds of inbound silence before a connection is dropped.
    pub pong_timeout_secs: u64,
    /// Seconds allowed for one transport write.
    pub write_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Seconds to wait for sessions to finish during shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: Vec::new(),
            queue_capacity: 256,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
            write_timeout_secs: 10,
            max_message_size: 64 * 1024,
            shutdown_timeout_secs: 10,
        }
    }
}

impl From<&DevsyncSettings> for ServerConfig {
    fn from(settings: &DevsyncSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            cors_origins: settings.server.cors_origins.clone(),
            queue_capacity: settings.hub.queue_capacity,
            ping_interval_secs: settings.hub.ping_interval_secs,
            pong_timeout_secs: settings.hub.pong_timeout_secs,
            write_timeout_secs: settings.hub.write_timeout_secs,
            max_message_size: settings.hub.max_message_size,
            shutdown_timeout_secs: settings.server.shutdown_timeout_secs,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Shutdown grace period.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
