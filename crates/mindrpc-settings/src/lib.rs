//! # mindrpc-settings
//!
//! Connection settings for the MindRPC/2 client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`MindRpcSettings::default()`]
//! 2. **User file**: `~/.mindrpc/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `MINDRPC_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use mindrpc_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("connecting to {}", settings.url());
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_env_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::MindRpcSettings;
