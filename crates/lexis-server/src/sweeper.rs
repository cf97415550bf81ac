//! Background removal of expired sessions.
//!
//! Validation already rejects expired tokens on its own; the sweep only
//! keeps the session table from growing without bound.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::context::ServerContext;
use crate::error::ServerError;

pub fn spawn_sweeper(
    server: Arc<ServerContext>,
    interval: Duration,
) -> Result<JoinHandle<()>, ServerError> {
    thread::Builder::new()
        .name("lexis-sweeper".into())
        .spawn(move || {
            debug!(interval_secs = interval.as_secs(), "session sweeper started");
            while !server.shutdown.wait_timeout(interval) {
                let _ = server.sessions.remove_expired();
            }
            debug!("session sweeper stopped");
        })
        .map_err(|source| ServerError::Spawn {
            what: "sweeper",
            source,
        })
}
