//! Settings type definitions.
//!
//! All types use camelCase JSON. Every section implements [`Default`] with
//! production values and is `#[serde(default)]`, so a partial settings file
//! only needs the keys it changes.

use prism_core::RetryConfig;
use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "api": { "baseUrl": "https://dash.example.com" },
///   "channel": { "url": "wss://dash.example.com/ws", "reconnect": { "maxRetries": 5 } },
///   "dashboard": { "maxInsights": 10 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrismSettings {
    /// REST API client settings.
    pub api: ApiSettings,
    /// Push channel settings.
    pub channel: ChannelSettings,
    /// Reconciler settings.
    pub dashboard: DashboardSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// REST API client settings, shared by the snapshot and conversation APIs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Bearer token sent with every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token: None,
            timeout_ms: 15_000,
        }
    }
}

/// Push channel (WebSocket) settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// WebSocket endpoint.
    pub url: String,
    /// Reconnect backoff.
    pub reconnect: RetryConfig,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws/dashboard".to_string(),
            reconnect: RetryConfig::default(),
        }
    }
}

/// Reconciler settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardSettings {
    /// Maximum AI insights kept after each merge.
    pub max_insights: usize,
    /// Fall back to placeholder state when the snapshot fetch fails.
    pub fallback_on_fetch_error: bool,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            max_insights: 10,
            fallback_on_fetch_error: true,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Per-module level overrides, e.g. `{"prism_dashboard": "debug"}`.
    pub modules: std::collections::BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            modules: std::collections::BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_serialize_camel_case() {
        let json = serde_json::to_value(PrismSettings::default()).unwrap();
        assert_eq!(json["api"]["baseUrl"], "http://localhost:8000");
        assert_eq!(json["api"]["timeoutMs"], 15_000);
        assert!(json["api"].get("token").is_none());
        assert_eq!(json["dashboard"]["maxInsights"], 10);
        assert_eq!(json["channel"]["reconnect"]["maxRetries"], 10);
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let settings: PrismSettings =
            serde_json::from_str(r#"{"channel": {"url": "wss://x/ws"}}"#).unwrap();
        assert_eq!(settings.channel.url, "wss://x/ws");
        assert_eq!(settings.channel.reconnect, RetryConfig::default());
        assert_eq!(settings.api, ApiSettings::default());
    }
}
