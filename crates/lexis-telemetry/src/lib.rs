//! # lexis-telemetry
//!
//! Installs the process-wide `tracing` subscriber: one `fmt` layer (text or
//! JSON) behind an [`EnvFilter`]. `RUST_LOG`, when set, replaces the
//! configured directives entirely.

#![deny(unsafe_code)]

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{directives}': {reason}")]
    InvalidFilter { directives: String, reason: String },

    #[error("telemetry already initialised: {0}")]
    AlreadyInitialized(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default level directive, e.g. `info`. Overridden by `RUST_LOG`.
    pub level: String,
    pub format: OutputFormat,
    /// Per-module overrides (e.g. `lexis_server` => `debug`).
    pub module_levels: Vec<(String, String)>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: OutputFormat::Text,
            module_levels: Vec::new(),
        }
    }
}

impl TelemetryConfig {
    /// The `EnvFilter` directive string this config describes.
    pub fn directives(&self) -> String {
        let mut filter = self.level.trim().to_lowercase();
        if filter.is_empty() {
            filter.push_str("info");
        }
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.trim().to_lowercase()));
        }
        filter
    }
}

fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = config.directives();
    EnvFilter::try_new(&directives).map_err(|e| TelemetryError::InvalidFilter {
        directives,
        reason: e.to_string(),
    })
}

/// Initialize the telemetry subsystem. Call once at startup; a second call
/// returns [`TelemetryError::AlreadyInitialized`].
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;

    let (text, json) = match config.format {
        OutputFormat::Text => (
            Some(tracing_subscriber::fmt::layer().with_target(true)),
            None,
        ),
        OutputFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_list(true),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;
    tracing::debug!(format = ?config.format, "telemetry initialised");
    Ok(())
}
