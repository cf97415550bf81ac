//! Shared state handed to every worker and handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lexis_auth::SessionManager;
use lexis_core::Clock;
use lexis_services::Services;
use lexis_store::{EntityStore, Repositories};

use crate::config::ServerConfig;
use crate::push::PushRouter;
use crate::registry::ConnectionRegistry;
use crate::shutdown::ShutdownSignal;
use crate::stats::ServerStats;

/// Everything a request needs, built once at startup. No globals.
pub struct ServerContext {
    pub config: ServerConfig,
    pub store: EntityStore,
    pub repos: Repositories,
    pub sessions: Arc<SessionManager>,
    pub services: Services,
    pub connections: Arc<ConnectionRegistry>,
    pub push: PushRouter,
    pub stats: Arc<ServerStats>,
    pub shutdown: ShutdownSignal,
    pub clock: Arc<dyn Clock>,
    pub started_at: DateTime<Utc>,
}

impl ServerContext {
    /// Wire repositories, sessions and services over `store`. The store's
    /// clock drives every expiry and timestamp.
    pub fn new(config: ServerConfig, store: EntityStore) -> Self {
        let clock = store.clock();
        let repos = Repositories::in_memory(&store);
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&repos.sessions),
            Arc::clone(&clock),
            config.session,
        ));
        let services = Services::new(
            &repos,
            Arc::clone(&sessions),
            Arc::clone(&clock),
            config.chat,
        );
        let connections = Arc::new(ConnectionRegistry::new());
        let stats = Arc::new(ServerStats::new());
        let push = PushRouter::new(
            Arc::clone(&repos.users),
            Arc::clone(&connections),
            Arc::clone(&clock),
            Arc::clone(&stats),
        );
        Self {
            started_at: clock.now(),
            config,
            store,
            repos,
            sessions,
            services,
            connections,
            push,
            stats,
            shutdown: ShutdownSignal::new(),
            clock,
        }
    }

    pub fn in_memory(config: ServerConfig) -> Self {
        Self::new(config, EntityStore::new())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("config", &self.config)
            .field("connections", &self.connections.count())
            .finish_non_exhaustive()
    }
}
