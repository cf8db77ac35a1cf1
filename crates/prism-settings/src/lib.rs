//! # prism-settings
//!
//! Configuration management with layered sources for the Prism client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`PrismSettings::default()`]
//! 2. **User file** — `~/.prism/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `PRISM_*` overrides (highest priority)
//!
//! Library code never reaches for the global; the binary loads settings once
//! and hands the relevant sections to each component.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<PrismSettings> = OnceLock::new();

/// Get the process-wide settings, loading them on first access.
///
/// Falls back to compiled defaults if the settings file cannot be read.
pub fn get_settings() -> &'static PrismSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Install a specific settings value as the process-wide settings.
///
/// Returns the value back if settings were already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: PrismSettings) -> std::result::Result<(), PrismSettings> {
    SETTINGS.set(settings)
}
