//! Server-initiated frames to a user's current socket.
//!
//! Delivery happens on the calling thread through the target connection's
//! write lock. Offline targets are dropped; nothing is queued.

use std::sync::Arc;

use lexis_core::ids::{ConnectionId, UserId};
use lexis_core::Clock;
use lexis_protocol::{Envelope, PushType};
use lexis_store::UserRepository;
use serde_json::Value;
use tracing::debug;

use crate::registry::ConnectionRegistry;
use crate::stats::ServerStats;

pub struct PushRouter {
    users: Arc<dyn UserRepository>,
    connections: Arc<ConnectionRegistry>,
    clock: Arc<dyn Clock>,
    stats: Arc<ServerStats>,
}

impl PushRouter {
    pub fn new(
        users: Arc<dyn UserRepository>,
        connections: Arc<ConnectionRegistry>,
        clock: Arc<dyn Clock>,
        stats: Arc<ServerStats>,
    ) -> Self {
        Self {
            users,
            connections,
            clock,
            stats,
        }
    }

    /// Deliver to `user` if they are online. Returns whether the frame was
    /// written.
    pub fn push(&self, user: &UserId, kind: PushType, data: Value) -> bool {
        let Some(connection) = self.users.connection_of(user) else {
            debug!(user_id = %user, push = %kind, "push dropped: user offline");
            self.stats.push(false);
            return false;
        };
        self.push_to_connection(&connection, kind, data)
    }

    pub fn push_to_connection(&self, id: &ConnectionId, kind: PushType, data: Value) -> bool {
        let delivered = match self.connections.get(id) {
            Some(conn) => conn
                .send(&Envelope::push(kind, data, self.clock.now()))
                .is_ok(),
            None => false,
        };
        if !delivered {
            debug!(connection_id = %id, push = %kind, "push dropped");
        }
        self.stats.push(delivered);
        delivered
    }
}

impl std::fmt::Debug for PushRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRouter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::loopback;
    use lexis_core::entities::{Level, NewUser, Role};
    use lexis_core::SystemClock;
    use lexis_protocol::Frame;
    use lexis_store::{EntityStore, Repositories};

    fn setup() -> (PushRouter, Repositories, Arc<ConnectionRegistry>, Arc<ServerStats>) {
        let repos = Repositories::in_memory(&EntityStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let stats = Arc::new(ServerStats::new());
        let router = PushRouter::new(
            Arc::clone(&repos.users),
            Arc::clone(&registry),
            Arc::new(SystemClock),
            Arc::clone(&stats),
        );
        (router, repos, registry, stats)
    }

    fn user(repos: &Repositories) -> UserId {
        repos
            .users
            .create(NewUser {
                fullname: "P".into(),
                email: format!("{}@x.com", UserId::new()),
                password: "pw".into(),
                level: Level::Beginner,
                role: Role::Student,
            })
            .unwrap()
            .id
    }

    #[test]
    fn offline_user_is_dropped() {
        let (router, repos, _registry, stats) = setup();
        let id = user(&repos);
        assert!(!router.push(&id, PushType::ReceiveMessage, serde_json::json!({})));
        assert_eq!(stats.snapshot().pushes_dropped, 1);
    }

    #[test]
    fn online_user_receives_push_on_current_socket() {
        let (router, repos, registry, stats) = setup();
        let id = user(&repos);
        let (conn, mut reader) = loopback();
        let conn = Arc::new(conn);
        registry.add(Arc::clone(&conn));
        let _ = repos.users.set_online(&id, conn.id()).unwrap();

        assert!(router.push(&id, PushType::ReceiveMessage, serde_json::json!({"content": "hi"})));
        let Some(Frame::Line(line)) = reader.next_frame().unwrap() else {
            panic!("expected a frame");
        };
        let env: Envelope = serde_json::from_str(&line).unwrap();
        assert_eq!(env.message_type, "RECEIVE_MESSAGE");
        assert!(env.message_id.is_none());
        assert_eq!(env.data()["content"], "hi");
        assert_eq!(stats.snapshot().pushes_delivered, 1);
    }

    #[test]
    fn stale_connection_is_dropped() {
        let (router, repos, _registry, _stats) = setup();
        let id = user(&repos);
        let _ = repos.users.set_online(&id, &ConnectionId::new()).unwrap();
        assert!(!router.push(&id, PushType::VoiceCallEnded, serde_json::json!({})));
    }
}
