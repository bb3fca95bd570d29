//! Settings type definitions.
//!
//! Field names are camelCase on disk, matching the option names devices and
//! web clients already use (`appName`, `hwId`, ...).

use mindrpc_core::{DEFAULT_SCHEMA_VERSION, StandardHeaders};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Connection settings for one MindRPC/2 peer.
///
/// # JSON Format
///
/// ```json
/// {
///   "host": "192.168.1.20",
///   "port": 2412,
///   "appName": "mindrpc-cli"
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MindRpcSettings {
    /// Use `wss://` instead of `ws://`.
    pub secure: bool,
    /// Device host name or address.
    pub host: String,
    /// Device port; 0 leaves the port out of the URL.
    pub port: u16,
    /// Default `SchemaVersion` header; 0 means the protocol default.
    pub schema_version: u32,
    /// `ApplicationName` standard header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    /// `ApplicationVersion` standard header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// `ApplicationSessionId` standard header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_session_id: Option<String>,
    /// `HardwarePlatform` standard header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hw_platform: Option<String>,
    /// `HardwareIdentifier` standard header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hw_id: Option<String>,
}

impl Default for MindRpcSettings {
    fn default() -> Self {
        Self {
            secure: false,
            host: "localhost".to_string(),
            port: 0,
            schema_version: DEFAULT_SCHEMA_VERSION,
            app_name: None,
            app_version: None,
            app_session_id: None,
            hw_platform: None,
            hw_id: None,
        }
    }
}

impl MindRpcSettings {
    /// Settings for `host:port` with everything else defaulted.
    pub fn for_device(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// URL scheme selected by [`secure`](Self::secure).
    pub fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// WebSocket URL, e.g. `ws://tivo.local:2412`.
    pub fn url(&self) -> String {
        if self.port == 0 {
            format!("{}://{}", self.scheme(), self.host)
        } else {
            format!("{}://{}:{}", self.scheme(), self.host, self.port)
        }
    }

    /// Schema version with 0 mapped to the protocol default.
    pub fn effective_schema_version(&self) -> u32 {
        if self.schema_version == 0 {
            DEFAULT_SCHEMA_VERSION
        } else {
            self.schema_version
        }
    }

    /// Identification headers attached to every outgoing message.
    pub fn standard_headers(&self) -> StandardHeaders {
        StandardHeaders::new(self.effective_schema_version())
            .with_field("ApplicationName", self.app_name.as_deref())
            .with_field("ApplicationVersion", self.app_version.as_deref())
            .with_field("ApplicationSessionId", self.app_session_id.as_deref())
            .with_field("HardwarePlatform", self.hw_platform.as_deref())
            .with_field("HardwareIdentifier", self.hw_id.as_deref())
    }

    /// Reject settings that cannot produce a usable URL.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(SettingsError::InvalidValue("host must not be empty".into()));
        }
        if self.host.contains(['/', ' ']) {
            return Err(SettingsError::InvalidValue(format!(
                "host {:?} is not a bare host name",
                self.host
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults() {
        let settings = MindRpcSettings::default();
        assert!(!settings.secure);
        assert_eq!(settings.port, 0);
        assert_eq!(settings.schema_version, 22);
        assert!(settings.app_name.is_none());
    }

    #[test]
    fn url_omits_zero_port() {
        let settings = MindRpcSettings::for_device("tivo.local", 0);
        assert_eq!(settings.url(), "ws://tivo.local");
    }

    #[test]
    fn url_with_port_and_secure() {
        let mut settings = MindRpcSettings::for_device("10.0.0.5", 2413);
        settings.secure = true;
        assert_eq!(settings.url(), "wss://10.0.0.5:2413");
    }

    #[test]
    fn zero_schema_version_falls_back() {
        let settings = MindRpcSettings {
            schema_version: 0,
            ..MindRpcSettings::default()
        };
        assert_eq!(settings.effective_schema_version(), 22);
        assert_eq!(settings.standard_headers().schema_version(), 22);
    }

    #[test]
    fn standard_headers_in_fixed_order() {
        let settings = MindRpcSettings {
            hw_id: Some("tsn:123".into()),
            app_name: Some("demo".into()),
            app_version: Some(String::new()),
            ..MindRpcSettings::default()
        };
        assert_eq!(
            settings.standard_headers().lines(),
            [
                "Content-type: application/json",
                "ApplicationName: demo",
                "HardwareIdentifier: tsn:123",
            ]
        );
    }

    #[test]
    fn camel_case_json() {
        let settings: MindRpcSettings =
            serde_json::from_str(r#"{"host":"box","appSessionId":"s1","schemaVersion":30}"#)
                .unwrap();
        assert_eq!(settings.host, "box");
        assert_eq!(settings.app_session_id.as_deref(), Some("s1"));
        assert_eq!(settings.schema_version, 30);
        assert_eq!(settings.port, 0);
    }

    #[test]
    fn validate_rejects_empty_host() {
        let settings = MindRpcSettings::for_device("  ", 2412);
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn validate_rejects_url_as_host() {
        let settings = MindRpcSettings::for_device("ws://box", 2412);
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));
        assert!(MindRpcSettings::for_device("box", 2412).validate().is_ok());
    }
}
