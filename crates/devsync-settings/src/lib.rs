//! # devsync-settings
//!
//! Configuration for the devsync server, loaded from three layers (lowest
//! priority first):
//! 1. **Compiled defaults**: [`DevsyncSettings::default()`]
//! 2. **Settings file**: an optional JSON file
//! 3. **Environment variables**: `DEVSYNC_*`, with `__` separating nested
//!    keys (`DEVSYNC_HUB__QUEUE_CAPACITY=512`)
//!
//! Loaded settings are validated before they are returned.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{ENV_PREFIX, load_settings, load_settings_from_path};
pub use types::*;
