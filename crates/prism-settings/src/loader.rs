//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PrismSettings::default()`]
//! 2. If `~/.prism/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `PRISM_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{DashboardSettings, PrismSettings};

/// Resolve the path to the settings file (`~/.prism/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".prism").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PrismSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PrismSettings> {
    let mut settings = load_file_layer(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
fn load_file_layer(path: &Path) -> Result<PrismSettings> {
    let defaults = serde_json::to_value(PrismSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: PrismSettings = serde_json::from_value(merged)?;
    sanitize(&mut settings);
    Ok(settings)
}

/// Reset file values the env layer would have rejected back to defaults.
fn sanitize(settings: &mut PrismSettings) {
    if settings.dashboard.max_insights == 0 {
        let default = DashboardSettings::default().max_insights;
        warn!(default, "maxInsights must be at least 1, using default");
        settings.dashboard.max_insights = default;
    }
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `PRISM_*` overrides read through `lookup`.
///
/// `lookup` is `std::env::var` in production; tests pass a map. Empty and
/// out-of-range values are ignored (logged at `warn`) so a typo never
/// replaces a valid file value.
pub fn apply_overrides(settings: &mut PrismSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── API ─────────────────────────────────────────────────────────
    if let Some(v) = env.string("PRISM_API_URL") {
        settings.api.base_url = v.trim_end_matches('/').to_string();
    }
    if let Some(v) = env.string("PRISM_API_TOKEN") {
        settings.api.token = Some(v);
    }
    if let Some(v) = env.u64("PRISM_API_TIMEOUT_MS", 100, 600_000) {
        settings.api.timeout_ms = v;
    }

    // ── Channel ─────────────────────────────────────────────────────
    if let Some(v) = env.string("PRISM_WS_URL") {
        settings.channel.url = v;
    }
    if let Some(v) = env
        .u64("PRISM_WS_MAX_RETRIES", 0, 1000)
        .and_then(|v| u32::try_from(v).ok())
    {
        settings.channel.reconnect.max_retries = v;
    }
    if let Some(v) = env.u64("PRISM_WS_BASE_DELAY_MS", 10, 600_000) {
        settings.channel.reconnect.base_delay_ms = v;
    }
    if let Some(v) = env.u64("PRISM_WS_MAX_DELAY_MS", 10, 3_600_000) {
        settings.channel.reconnect.max_delay_ms = v;
    }

    // ── Dashboard ───────────────────────────────────────────────────
    if let Some(v) = env
        .u64("PRISM_MAX_INSIGHTS", 1, 1000)
        .and_then(|v| usize::try_from(v).ok())
    {
        settings.dashboard.max_insights = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("PRISM_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("PRISM_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid integer env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"api": {"baseUrl": "a", "timeoutMs": 1}});
        let source = serde_json::json!({"api": {"baseUrl": "b"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["api"]["baseUrl"], "b");
        assert_eq!(merged["api"]["timeoutMs"], 1);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, PrismSettings::default());
    }

    #[test]
    fn partial_file_overrides_nested_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"channel": {"reconnect": {"maxRetries": 3}}, "dashboard": {"maxInsights": 5}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.channel.reconnect.max_retries, 3);
        assert_eq!(settings.channel.reconnect.base_delay_ms, 1000);
        assert_eq!(settings.dashboard.max_insights, 5);
        assert!(settings.dashboard.fallback_on_fetch_error);
    }

    #[test]
    fn zero_max_insights_in_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"dashboard": {"maxInsights": 0}}"#).unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.dashboard.max_insights, 10);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert_matches!(load_file_layer(&path), Err(SettingsError::Json(_)));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply_valid_values() {
        let mut settings = PrismSettings::default();
        apply_overrides(
            &mut settings,
            lookup_from(&[
                ("PRISM_API_URL", "https://dash.example.com/"),
                ("PRISM_API_TOKEN", "secret"),
                ("PRISM_WS_URL", "wss://dash.example.com/ws"),
                ("PRISM_WS_MAX_RETRIES", "4"),
                ("PRISM_MAX_INSIGHTS", "20"),
                ("PRISM_LOG_JSON", "yes"),
            ]),
        );
        assert_eq!(settings.api.base_url, "https://dash.example.com");
        assert_eq!(settings.api.token.as_deref(), Some("secret"));
        assert_eq!(settings.channel.url, "wss://dash.example.com/ws");
        assert_eq!(settings.channel.reconnect.max_retries, 4);
        assert_eq!(settings.dashboard.max_insights, 20);
        assert!(settings.logging.json);
    }

    #[test]
    fn overrides_ignore_invalid_values() {
        let mut settings = PrismSettings::default();
        apply_overrides(
            &mut settings,
            lookup_from(&[
                ("PRISM_MAX_INSIGHTS", "0"),
                ("PRISM_API_TIMEOUT_MS", "soon"),
                ("PRISM_LOG_JSON", "maybe"),
                ("PRISM_API_URL", ""),
            ]),
        );
        assert_eq!(settings, PrismSettings::default());
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("2"), None);
        assert_eq!(parse_u64_range(" 42 ", 1, 100), Some(42));
        assert_eq!(parse_u64_range("101", 1, 100), None);
        assert_eq!(parse_u64_range("-1", 0, 100), None);
    }
}
