//! Settings tree. Every section has compiled defaults so a partial JSON file
//! is always enough.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LexisSettings {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub chat: ChatSettings,
    pub logging: LoggingSettings,
    /// Load demo accounts and content at startup.
    pub seed_demo_data: bool,
}

impl Default for LexisSettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            session: SessionSettings::default(),
            chat: ChatSettings::default(),
            logging: LoggingSettings::default(),
            seed_demo_data: false,
        }
    }
}

impl LexisSettings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(SettingsError::InvalidValue("server.host is empty".into()));
        }
        if self.server.max_connections == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxConnections must be at least 1".into(),
            ));
        }
        if self.server.max_frame_bytes < 64 {
            return Err(SettingsError::InvalidValue(
                "server.maxFrameBytes must be at least 64".into(),
            ));
        }
        if self.session.ttl_secs == 0 {
            return Err(SettingsError::InvalidValue("session.ttlSecs must be positive".into()));
        }
        if self.chat.max_message_chars == 0 || self.chat.history_limit == 0 {
            return Err(SettingsError::InvalidValue(
                "chat limits must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Listener and per-connection limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    /// 0 picks an ephemeral port.
    pub port: u16,
    pub max_connections: usize,
    /// Longest accepted request line, in bytes.
    pub max_frame_bytes: usize,
    /// Close connections idle this long. 0 disables.
    pub idle_timeout_secs: u64,
    /// Give up on a blocked socket write after this long. 0 disables.
    pub write_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5555,
            max_connections: 1024,
            max_frame_bytes: 1_048_576,
            idle_timeout_secs: 0,
            write_timeout_secs: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    pub ttl_secs: u64,
    /// Renew expiry on every authenticated request.
    pub sliding: bool,
    /// How often expired sessions are purged. 0 disables the sweeper.
    pub sweep_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 86_400,
            sliding: false,
            sweep_interval_secs: 300,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    pub max_message_chars: usize,
    /// Cap on messages returned by one history query.
    pub history_limit: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_message_chars: 4000,
            history_limit: 200,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
    /// Per-module level overrides, e.g. `{"lexis_server": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            modules: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = LexisSettings::default();
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 5555);
        assert_eq!(s.server.max_frame_bytes, 1_048_576);
        assert_eq!(s.server.idle_timeout_secs, 0);
        assert_eq!(s.session.ttl_secs, 86_400);
        assert!(!s.session.sliding);
        assert_eq!(s.session.sweep_interval_secs, 300);
        assert_eq!(s.chat.max_message_chars, 4000);
        assert_eq!(s.chat.history_limit, 200);
        assert!(!s.seed_demo_data);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn camel_case_on_the_wire() {
        let v = serde_json::to_value(LexisSettings::default()).unwrap();
        assert!(v["server"].get("maxFrameBytes").is_some());
        assert!(v["session"].get("sweepIntervalSecs").is_some());
        assert_eq!(v["logging"]["format"], "text");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: LexisSettings = serde_json::from_str(r#"{"server": {"port": 7000}}"#).unwrap();
        assert_eq!(s.server.port, 7000);
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.chat.history_limit, 200);
    }

    #[test]
    fn validate_rejects_nonsense() {
        let mut s = LexisSettings::default();
        s.server.max_connections = 0;
        assert!(s.validate().is_err());

        let mut s = LexisSettings::default();
        s.session.ttl_secs = 0;
        assert!(s.validate().is_err());

        let mut s = LexisSettings::default();
        s.server.max_frame_bytes = 10;
        assert!(s.validate().is_err());
    }
}
