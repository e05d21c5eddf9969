//! Settings sections.
//!
//! Every section is `#[serde(default)]`, so a settings file only needs to
//! name the keys it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevsyncSettings {
    /// Listener and HTTP settings.
    pub server: ServerSettings,
    /// Real-time hub tuning.
    pub hub: HubSettings,
    /// Token verification.
    pub auth: AuthSettings,
    /// SQLite storage.
    pub database: DatabaseSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Listener and HTTP settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,
    /// Origins allowed by CORS. Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Seconds to wait for in-flight sessions during shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["http://localhost:5173".to_string()],
            shutdown_timeout_secs: 10,
        }
    }
}

impl ServerSettings {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Shutdown grace period.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Real-time hub tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    /// Outbound frames buffered per connection before it is evicted.
    pub queue_capacity: usize,
    /// Seconds between server pings.
    pub ping_interval_secs: u64,
    /// Seconds of inbound silence after which a connection is dropped.
    pub pong_timeout_secs: u64,
    /// Seconds allowed for a single transport write.
    pub write_timeout_secs: u64,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
            write_timeout_secs: 10,
            max_message_size: 64 * 1024,
        }
    }
}

impl HubSettings {
    /// Ping cadence.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Liveness deadline.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    /// Per-write deadline.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

/// Token verification settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 signing secret shared with the account service.
    pub jwt_secret: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: "devsync-dev-secret-change-me".to_string(),
        }
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

/// SQLite storage settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file path. `:memory:` keeps everything in process.
    pub path: String,
    /// Pooled connections.
    pub pool_size: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "devsync.db".to_string(),
            pool_size: 4,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            json: false,
            filter: "devsync=info,tower_http=info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_defaults() {
        let hub = HubSettings::default();
        assert_eq!(hub.queue_capacity, 256);
        assert_eq!(hub.ping_interval(), Duration::from_secs(30));
        assert_eq!(hub.pong_timeout(), Duration::from_secs(60));
        assert_eq!(hub.write_timeout(), Duration::from_secs(10));
        assert_eq!(hub.max_message_size, 65_536);
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let server = ServerSettings {
            host: "127.0.0.1".into(),
            port: 9000,
            ..ServerSettings::default()
        };
        assert_eq!(server.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let settings: DevsyncSettings =
            serde_json::from_str(r#"{"hub":{"queue_capacity":8}}"#).unwrap();
        assert_eq!(settings.hub.queue_capacity, 8);
        assert_eq!(settings.hub.ping_interval_secs, 30);
        assert_eq!(settings.server, ServerSettings::default());
    }

    #[test]
    fn debug_redacts_secret() {
        let auth = AuthSettings {
            jwt_secret: "hunter2".into(),
        };
        let printed = format!("{auth:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("redacted"));
    }
}
