//! Live connections by id.

use std::sync::Arc;

use dashmap::DashMap;
use lexis_core::ids::ConnectionId;

use crate::connection::Connection;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, connection: Arc<Connection>) {
        let _ = self
            .connections
            .insert(connection.id().clone(), connection);
    }

    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.remove(id).map(|(_, c)| c)
    }

    /// Clone of the handle. The map shard lock is released before the
    /// caller writes to the socket.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|c| Arc::clone(c.value()))
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn authenticated_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|c| c.value().user().is_some())
            .count()
    }

    /// Close every socket so blocked worker reads return.
    pub fn close_all(&self) -> usize {
        let all: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .map(|c| Arc::clone(c.value()))
            .collect();
        for conn in &all {
            conn.close();
        }
        all.len()
    }
}
