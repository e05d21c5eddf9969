//! Layered settings loading.
//!
//! Loading flow:
//! 1. Start with compiled [`DevsyncSettings::default()`]
//! 2. If a settings file is given and exists, merge its JSON over defaults
//! 3. Merge `DEVSYNC_*` environment variables (highest priority)
//! 4. Validate the result

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::DevsyncSettings;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DEVSYNC_";

/// Load settings from defaults and environment only.
pub fn load_settings() -> Result<DevsyncSettings> {
    extract(base())
}

/// Load settings with a JSON file layered between defaults and environment.
///
/// A missing file is not an error; malformed JSON is.
pub fn load_settings_from_path(path: &Path) -> Result<DevsyncSettings> {
    if path.exists() {
        debug!(?path, "loading settings from file");
    } else {
        debug!(?path, "settings file not found, using defaults");
    }
    let figment = Figment::new()
        .merge(Serialized::defaults(DevsyncSettings::default()))
        .merge(Json::file(path))
        .merge(env());
    extract(figment)
}

fn base() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(DevsyncSettings::default()))
        .merge(env())
}

fn env() -> Env {
    Env::prefixed(ENV_PREFIX).split("__")
}

fn extract(figment: Figment) -> Result<DevsyncSettings> {
    let settings: DevsyncSettings = figment.extract()?;
    settings.validate()?;
    Ok(settings)
}

impl DevsyncSettings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.hub.queue_capacity == 0 {
            return Err(invalid("hub.queue_capacity must be at least 1"));
        }
        if self.hub.ping_interval_secs == 0 {
            return Err(invalid("hub.ping_interval_secs must be at least 1"));
        }
        if self.hub.pong_timeout_secs < self.hub.ping_interval_secs {
            return Err(invalid(
                "hub.pong_timeout_secs must not be shorter than hub.ping_interval_secs",
            ));
        }
        if self.hub.write_timeout_secs == 0 {
            return Err(invalid("hub.write_timeout_secs must be at least 1"));
        }
        if self.hub.max_message_size == 0 {
            return Err(invalid("hub.max_message_size must be at least 1"));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(invalid("auth.jwt_secret must not be empty"));
        }
        if self.database.pool_size == 0 {
            return Err(invalid("database.pool_size must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> SettingsError {
    SettingsError::InvalidValue(msg.to_string())
}
