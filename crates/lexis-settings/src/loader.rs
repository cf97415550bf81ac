//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LexisSettings::default()`]
//! 2. If a settings file is given and exists, deep-merge it over defaults
//! 3. Apply `LEXIS_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{LexisSettings, LogFormat};

/// Load settings from an optional file, then apply process env overrides.
///
/// A missing file is not an error; malformed JSON is.
pub fn load_settings(path: Option<&Path>) -> Result<LexisSettings> {
    load_settings_with(path, |name| std::env::var(name).ok())
}

/// Like [`load_settings`] with an explicit variable lookup.
pub fn load_settings_with(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LexisSettings> {
    let defaults = serde_json::to_value(LexisSettings::default())?;

    let merged = match path {
        Some(path) if path.exists() => {
            debug!(?path, "loading settings from file");
            let content = std::fs::read_to_string(path)?;
            let user: Value = serde_json::from_str(&content)?;
            deep_merge(defaults, user)
        }
        Some(path) => {
            debug!(?path, "settings file not found, using defaults");
            defaults
        }
        None => defaults,
    };

    let mut settings: LexisSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
}

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

/// Apply `LEXIS_*` overrides. Out-of-range or unparseable values are logged
/// and ignored.
pub fn apply_env_overrides(settings: &mut LexisSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = Env(&lookup);

    if let Some(v) = env.string("LEXIS_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u64_in("LEXIS_PORT", 1, 65_535) {
        settings.server.port = v as u16;
    }
    if let Some(v) = env.u64_in("LEXIS_MAX_CONNECTIONS", 1, 100_000) {
        settings.server.max_connections = v as usize;
    }
    if let Some(v) = env.u64_in("LEXIS_MAX_FRAME_BYTES", 1024, 64 * 1024 * 1024) {
        settings.server.max_frame_bytes = v as usize;
    }
    if let Some(v) = env.u64_in("LEXIS_IDLE_TIMEOUT_SECS", 0, 86_400) {
        settings.server.idle_timeout_secs = v;
    }

    if let Some(v) = env.u64_in("LEXIS_SESSION_TTL_SECS", 60, 30 * 86_400) {
        settings.session.ttl_secs = v;
    }
    if let Some(v) = env.bool("LEXIS_SESSION_SLIDING") {
        settings.session.sliding = v;
    }
    if let Some(v) = env.u64_in("LEXIS_SWEEP_INTERVAL_SECS", 0, 86_400) {
        settings.session.sweep_interval_secs = v;
    }

    if let Some(v) = env.u64_in("LEXIS_CHAT_MAX_CHARS", 1, 100_000) {
        settings.chat.max_message_chars = v as usize;
    }
    if let Some(v) = env.u64_in("LEXIS_HISTORY_LIMIT", 1, 10_000) {
        settings.chat.history_limit = v as usize;
    }

    if let Some(v) = env.string("LEXIS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("LEXIS_LOG_FORMAT") {
        match parse_log_format(&v) {
            Some(format) => settings.logging.format = format,
            None => warn!(key = "LEXIS_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
    if let Some(v) = env.bool("LEXIS_SEED") {
        settings.seed_demo_data = v;
    }
}

/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_lowercase().as_str() {
        "text" | "pretty" => Some(LogFormat::Text),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.0)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64_in(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.0)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, min, max, "invalid numeric env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 5555, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_skips_null_and_replaces_arrays() {
        let target = serde_json::json!({"a": 1, "list": [1, 2, 3]});
        let source = serde_json::json!({"a": null, "list": [9]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["list"], serde_json::json!([9]));
    }

    #[test]
    fn no_file_gives_defaults() {
        let s = load_settings_with(None, no_env).unwrap();
        assert_eq!(s, LexisSettings::default());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_with(Some(&dir.path().join("absent.json")), no_env).unwrap();
        assert_eq!(s.server.port, 5555);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"port": 6000}}, "session": {{"sliding": true}}, "logging": {{"modules": {{"lexis_server": "debug"}}}}}}"#
        )
        .unwrap();
        let s = load_settings_with(Some(file.path()), no_env).unwrap();
        assert_eq!(s.server.port, 6000);
        assert_eq!(s.server.host, "127.0.0.1");
        assert!(s.session.sliding);
        assert_eq!(s.session.ttl_secs, 86_400);
        assert_eq!(s.logging.modules.get("lexis_server").map(String::as_str), Some("debug"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_settings_with(Some(file.path()), no_env).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"maxConnections": 0}}}}"#).unwrap();
        let err = load_settings_with(Some(file.path()), no_env).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    #[test]
    fn env_overrides_beat_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"port": 6000}}}}"#).unwrap();
        let env = env_of(&[
            ("LEXIS_PORT", "7000"),
            ("LEXIS_HOST", "0.0.0.0"),
            ("LEXIS_SESSION_SLIDING", "yes"),
            ("LEXIS_LOG_FORMAT", "JSON"),
            ("LEXIS_SEED", "1"),
        ]);
        let s = load_settings_with(Some(file.path()), env).unwrap();
        assert_eq!(s.server.port, 7000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert!(s.session.sliding);
        assert_eq!(s.logging.format, LogFormat::Json);
        assert!(s.seed_demo_data);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let env = env_of(&[
            ("LEXIS_PORT", "70000"),
            ("LEXIS_SESSION_TTL_SECS", "5"),
            ("LEXIS_SESSION_SLIDING", "maybe"),
            ("LEXIS_LOG_FORMAT", "xml"),
            ("LEXIS_HOST", ""),
        ]);
        let s = load_settings_with(None, env).unwrap();
        assert_eq!(s, LexisSettings::default());
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("nah"), None);
        assert_eq!(parse_u64_range(" 42 ", 1, 100), Some(42));
        assert_eq!(parse_u64_range("0", 1, 100), None);
        assert_eq!(parse_u64_range("-3", 0, 100), None);
    }
}
