//! # prism-logging
//!
//! Structured logging with `tracing`.
//!
//! - [`init_logging`] installs the global subscriber from [`LoggingSettings`]:
//!   an `EnvFilter` (`RUST_LOG` wins over the configured level and module
//!   overrides) feeding either a compact or a JSON `fmt` layer on stderr.
//! - [`capture`] records events in memory so tests can assert on what a
//!   component logged.

#![deny(unsafe_code)]

pub mod capture;

pub use capture::{CapturedEvent, CapturedLogs, capture_logs};

use prism_settings::LoggingSettings;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Build the filter directive string for the given settings.
///
/// `{"level": "info", "modules": {"prism_dashboard": "debug"}}` becomes
/// `info,prism_dashboard=debug`.
pub fn filter_directives(settings: &LoggingSettings) -> String {
    let mut directives = settings.level.to_lowercase();
    for (module, level) in &settings.modules {
        directives.push(',');
        directives.push_str(module);
        directives.push('=');
        directives.push_str(&level.to_lowercase());
    }
    directives
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup. Later calls are no-ops, so tests and the binary can
/// both call it freely. Returns `false` when a subscriber was already set.
pub fn init_logging(settings: &LoggingSettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(settings)));

    if settings.json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
