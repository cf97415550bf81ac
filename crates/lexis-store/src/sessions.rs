use chrono::{DateTime, Utc};
use lexis_core::entities::Session;
use lexis_core::ids::{ConnectionId, UserId};

use crate::error::StoreError;
use crate::store::EntityStore;

/// Token-keyed session storage with a connection → token reverse index.
///
/// "Not found" is an ordinary return value throughout; only `insert` fails.
pub trait SessionRepository: Send + Sync {
    /// Fails with `Conflict` on token collision and `NotFound` if the user
    /// does not exist.
    fn insert(&self, session: Session) -> Result<(), StoreError>;
    fn find(&self, token: &str) -> Option<Session>;

    /// Bind `token` to `connection`, replacing any earlier binding of either.
    fn associate(&self, token: &str, connection: &ConnectionId) -> bool;
    fn token_for_connection(&self, connection: &ConnectionId) -> Option<String>;

    /// Move expiry to `until` if that is later. Returns the resulting expiry.
    fn extend(&self, token: &str, until: DateTime<Utc>) -> Option<DateTime<Utc>>;

    fn remove(&self, token: &str) -> Option<Session>;
    fn remove_by_connection(&self, connection: &ConnectionId) -> Option<Session>;
    fn remove_by_user(&self, user_id: &UserId) -> Vec<Session>;

    /// Drop every session with `now > expires_at`. Returns how many went.
    fn remove_expired(&self, now: DateTime<Utc>) -> usize;
    fn count(&self) -> usize;
}

pub struct MemorySessionRepo {
    store: EntityStore,
}

impl MemorySessionRepo {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

impl SessionRepository for MemorySessionRepo {
    fn insert(&self, session: Session) -> Result<(), StoreError> {
        self.store.with_users_and_sessions(|users, sessions| {
            if !users.by_id.contains_key(&session.user_id) {
                return Err(StoreError::NotFound("User not found".into()));
            }
            if sessions.by_token.contains_key(&session.token) {
                return Err(StoreError::Conflict("Session token collision".into()));
            }
            if let Some(conn) = &session.connection {
                if let Some(stale) = sessions.by_connection.insert(conn.clone(), session.token.clone()) {
                    if let Some(s) = sessions.by_token.get_mut(&stale) {
                        s.connection = None;
                    }
                }
            }
            let _ = sessions.by_token.insert(session.token.clone(), session);
            Ok(())
        })
    }

    fn find(&self, token: &str) -> Option<Session> {
        self.store.with_sessions(|t| t.by_token.get(token).cloned())
    }

    fn associate(&self, token: &str, connection: &ConnectionId) -> bool {
        self.store.with_sessions(|t| {
            let Some(session) = t.by_token.get_mut(token) else {
                return false;
            };
            let old_conn = session.connection.replace(connection.clone());
            if let Some(old) = old_conn.filter(|c| c != connection) {
                if t.by_connection.get(&old).map(String::as_str) == Some(token) {
                    let _ = t.by_connection.remove(&old);
                }
            }
            if let Some(stale) = t.by_connection.insert(connection.clone(), token.to_owned()) {
                if stale != token {
                    if let Some(s) = t.by_token.get_mut(&stale) {
                        s.connection = None;
                    }
                }
            }
            true
        })
    }

    fn token_for_connection(&self, connection: &ConnectionId) -> Option<String> {
        self.store.with_sessions(|t| t.by_connection.get(connection).cloned())
    }

    fn extend(&self, token: &str, until: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.store.with_sessions(|t| {
            let session = t.by_token.get_mut(token)?;
            if until > session.expires_at {
                session.expires_at = until;
            }
            Some(session.expires_at)
        })
    }

    fn remove(&self, token: &str) -> Option<Session> {
        self.store.with_sessions(|t| t.remove(token))
    }

    fn remove_by_connection(&self, connection: &ConnectionId) -> Option<Session> {
        self.store.with_sessions(|t| {
            let token = t.by_connection.remove(connection)?;
            t.remove(&token)
        })
    }

    fn remove_by_user(&self, user_id: &UserId) -> Vec<Session> {
        self.store.with_sessions(|t| {
            let tokens: Vec<String> = t
                .by_token
                .values()
                .filter(|s| &s.user_id == user_id)
                .map(|s| s.token.clone())
                .collect();
            tokens.iter().filter_map(|tok| t.remove(tok)).collect()
        })
    }

    fn remove_expired(&self, now: DateTime<Utc>) -> usize {
        self.store.with_sessions(|t| {
            let expired: Vec<String> = t
                .by_token
                .values()
                .filter(|s| s.is_expired_at(now))
                .map(|s| s.token.clone())
                .collect();
            for token in &expired {
                let _ = t.remove(token);
            }
            expired.len()
        })
    }

    fn count(&self) -> usize {
        self.store.with_sessions(|t| t.by_token.len())
    }
}
