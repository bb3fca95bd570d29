//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`MindRpcSettings::default()`]
//! 2. If `~/.mindrpc/settings.json` exists, deep-merge it over the defaults
//! 3. Apply `MINDRPC_*` environment overrides
//! 4. Validate the result
//!
//! `null` in the file keeps the default for that key.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::MindRpcSettings;

/// Path to the settings file (`~/.mindrpc/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".mindrpc").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<MindRpcSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with env var overrides.
///
/// A missing file yields the defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<MindRpcSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

fn load_with_env<F>(path: &Path, lookup: F) -> Result<MindRpcSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(MindRpcSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: MindRpcSettings = serde_json::from_value(merged)?;
    apply_env_overrides_from(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key, anything else in `source` replaces `target`,
/// and `null` in `source` is skipped.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `MINDRPC_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut MindRpcSettings) {
    apply_env_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides using `lookup` to read variables.
///
/// Empty values are ignored. Values that fail to parse are logged and
/// ignored, leaving the file or default value in place.
pub fn apply_env_overrides_from<F>(settings: &mut MindRpcSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(v) = env.string("MINDRPC_HOST") {
        settings.host = v;
    }
    if let Some(v) = env.parsed("MINDRPC_PORT", |s| parse_u16_range(s, 1, u16::MAX)) {
        settings.port = v;
    }
    if let Some(v) = env.parsed("MINDRPC_SECURE", parse_bool) {
        settings.secure = v;
    }
    if let Some(v) = env.parsed("MINDRPC_SCHEMA_VERSION", |s| {
        parse_u32_range(s, 1, u32::MAX)
    }) {
        settings.schema_version = v;
    }

    // identification headers
    if let Some(v) = env.string("MINDRPC_APP_NAME") {
        settings.app_name = Some(v);
    }
    if let Some(v) = env.string("MINDRPC_APP_VERSION") {
        settings.app_version = Some(v);
    }
    if let Some(v) = env.string("MINDRPC_APP_SESSION_ID") {
        settings.app_session_id = Some(v);
    }
    if let Some(v) = env.string("MINDRPC_HW_PLATFORM") {
        settings.hw_platform = Some(v);
    }
    if let Some(v) = env.string("MINDRPC_HW_ID") {
        settings.hw_id = Some(v);
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within `min..=max`.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u32` within `min..=max`.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ── Env var reader ──────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = self.string(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
