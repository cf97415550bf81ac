//! Server configuration.

use std::time::Duration;

use lexis_auth::SessionPolicy;
use lexis_services::ChatLimits;

/// Configuration for the Lexis server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind. `0` picks a free port.
    pub port: u16,
    /// Connections beyond this are answered with an error and closed.
    pub max_connections: usize,
    /// Longest accepted request line in bytes.
    pub max_frame_bytes: usize,
    /// Close connections silent for this long. `None` disables.
    pub idle_timeout: Option<Duration>,
    /// Bound on a single blocked socket write. `None` waits forever.
    pub write_timeout: Option<Duration>,
    /// How often expired sessions are swept. `None` disables the sweeper.
    pub sweep_interval: Option<Duration>,
    pub session: SessionPolicy,
    pub chat: ChatLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5555,
            max_connections: 1024,
            max_frame_bytes: 1024 * 1024,
            idle_timeout: None,
            write_timeout: Some(Duration::from_secs(10)),
            sweep_interval: Some(Duration::from_secs(300)),
            session: SessionPolicy::default(),
            chat: ChatLimits::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `0` means "disabled" in seconds-valued settings.
pub fn secs_or_none(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
