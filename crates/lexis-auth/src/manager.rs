//! Session lifecycle.
//!
//! ```text
//! create ──► Active(expires_at) ──(now > expires_at)──► Expired
//!                  │
//!                  └──(logout / disconnect / supersede)──► Removed
//! ```
//!
//! Expiry is checked lazily in [`SessionManager::validate`], which never
//! deletes. [`SessionManager::remove_expired`] is the separate, idempotent
//! cleanup a sweeper can call.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use lexis_core::entities::Session;
use lexis_core::ids::{ConnectionId, UserId};
use lexis_core::{Clock, LexisError, Result};
use lexis_store::{SessionRepository, StoreError};
use tracing::{debug, info, warn};

use crate::token::{RandomTokenGenerator, TokenGenerator};

/// Wire message for every authentication failure on a protected request.
pub const INVALID_SESSION: &str = "Invalid or expired session";

const MAX_TOKEN_ATTEMPTS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionPolicy {
    pub ttl: TimeDelta,
    /// Push expiry forward on every successful validation.
    pub sliding: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl: TimeDelta::hours(24),
            sliding: false,
        }
    }
}

/// Result of looking a token up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validation {
    Valid(Session),
    Expired,
    Unknown,
}

impl Validation {
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Valid(s) => Some(&s.user_id),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

pub struct SessionManager {
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenGenerator>,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            sessions,
            clock,
            tokens: Arc::new(RandomTokenGenerator),
            policy,
        }
    }

    #[must_use]
    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub fn create(&self, user_id: &UserId) -> Result<Session> {
        self.create_with_ttl(user_id, self.policy.ttl)
    }

    /// Issue a session for `user_id`. Token collisions are retried a few
    /// times before giving up with `Conflict`.
    pub fn create_with_ttl(&self, user_id: &UserId, ttl: TimeDelta) -> Result<Session> {
        let mut last_err = None;
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let now = self.clock.now();
            let session = Session {
                token: self.tokens.generate(),
                user_id: user_id.clone(),
                connection: None,
                created_at: now,
                expires_at: now + ttl,
            };
            match self.sessions.insert(session.clone()) {
                Ok(()) => {
                    debug!(user_id = %user_id, expires_at = %session.expires_at, "session created");
                    return Ok(session);
                }
                Err(StoreError::Conflict(msg)) => {
                    warn!(user_id = %user_id, "session token collision, retrying");
                    last_err = Some(LexisError::Conflict(msg));
                }
                Err(other) => return Err(other.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| LexisError::conflict("Session token collision")))
    }

    /// Look a token up. Expired sessions are reported, not removed.
    pub fn validate(&self, token: &str) -> Validation {
        let Some(session) = self.sessions.find(token) else {
            return Validation::Unknown;
        };
        let now = self.clock.now();
        if session.is_expired_at(now) {
            return Validation::Expired;
        }
        if self.policy.sliding {
            if let Some(expires_at) = self.sessions.extend(token, now + self.policy.ttl) {
                return Validation::Valid(Session {
                    expires_at,
                    ..session
                });
            }
        }
        Validation::Valid(session)
    }

    /// `validate`, collapsed to the user id or the fixed auth error.
    pub fn authenticate(&self, token: Option<&str>) -> Result<Session> {
        match token.map(|t| self.validate(t)) {
            Some(Validation::Valid(session)) => Ok(session),
            Some(Validation::Expired) => {
                debug!("rejected expired session");
                Err(LexisError::unauthenticated(INVALID_SESSION))
            }
            Some(Validation::Unknown) | None => Err(LexisError::unauthenticated(INVALID_SESSION)),
        }
    }

    pub fn associate(&self, token: &str, connection: &ConnectionId) -> bool {
        self.sessions.associate(token, connection)
    }

    pub fn token_for_connection(&self, connection: &ConnectionId) -> Option<String> {
        self.sessions.token_for_connection(connection)
    }

    /// Renew to `now + ttl`. Never shortens.
    pub fn extend(&self, token: &str) -> Option<DateTime<Utc>> {
        self.sessions.extend(token, self.clock.now() + self.policy.ttl)
    }

    pub fn invalidate(&self, token: &str) -> Option<Session> {
        let removed = self.sessions.remove(token);
        if let Some(s) = &removed {
            info!(user_id = %s.user_id, "session invalidated");
        }
        removed
    }

    pub fn invalidate_by_connection(&self, connection: &ConnectionId) -> Option<Session> {
        let removed = self.sessions.remove_by_connection(connection);
        if let Some(s) = &removed {
            debug!(user_id = %s.user_id, connection_id = %connection, "session dropped with connection");
        }
        removed
    }

    pub fn invalidate_user(&self, user_id: &UserId) -> usize {
        self.sessions.remove_by_user(user_id).len()
    }

    pub fn remove_expired(&self) -> usize {
        let removed = self.sessions.remove_expired(self.clock.now());
        if removed > 0 {
            info!(removed, "expired sessions swept");
        }
        removed
    }

    pub fn active_count(&self) -> usize {
        self.sessions.count()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use lexis_core::entities::{Level, NewUser, Role};
    use lexis_core::ManualClock;
    use lexis_store::{EntityStore, Repositories};
    use parking_lot::Mutex;
    use proptest::prelude::*;

    struct Fixture {
        manager: SessionManager,
        clock: Arc<ManualClock>,
        user: UserId,
    }

    fn fixture(policy: SessionPolicy) -> Fixture {
        let clock = Arc::new(ManualClock::starting_now());
        let store = EntityStore::with_clock(clock.clone());
        let repos = Repositories::in_memory(&store);
        let user = repos
            .users
            .create(NewUser {
                fullname: "A".into(),
                email: "a@x.com".into(),
                password: "p".into(),
                level: Level::Beginner,
                role: Role::Student,
            })
            .unwrap();
        Fixture {
            manager: SessionManager::new(repos.sessions, clock.clone(), policy),
            clock,
            user: user.id,
        }
    }

    /// Hands out a scripted sequence of tokens.
    struct Scripted(Mutex<Vec<&'static str>>);

    impl TokenGenerator for Scripted {
        fn generate(&self) -> String {
            self.0.lock().pop().unwrap_or("fallback").to_owned()
        }
    }

    #[test]
    fn create_then_validate_resolves_user() {
        let f = fixture(SessionPolicy::default());
        let session = f.manager.create(&f.user).unwrap();
        assert_eq!(session.token.len(), 64);
        assert_eq!(f.manager.validate(&session.token).user_id(), Some(&f.user));
        assert_eq!(f.manager.validate("nope"), Validation::Unknown);
    }

    #[test]
    fn expired_sessions_are_reported_but_kept_until_swept() {
        let f = fixture(SessionPolicy {
            ttl: TimeDelta::hours(1),
            sliding: false,
        });
        let session = f.manager.create(&f.user).unwrap();
        f.clock.advance(TimeDelta::hours(1));
        assert!(f.manager.validate(&session.token).is_valid());

        f.clock.advance(TimeDelta::milliseconds(1));
        assert_eq!(f.manager.validate(&session.token), Validation::Expired);
        assert_eq!(f.manager.active_count(), 1);

        assert_eq!(f.manager.remove_expired(), 1);
        assert_eq!(f.manager.validate(&session.token), Validation::Unknown);
        assert_eq!(f.manager.remove_expired(), 0);
    }

    #[test]
    fn authenticate_uses_fixed_message() {
        let f = fixture(SessionPolicy::default());
        for token in [None, Some("missing")] {
            assert_matches!(
                f.manager.authenticate(token),
                Err(LexisError::Unauthenticated(m)) if m == INVALID_SESSION
            );
        }
    }

    #[test]
    fn sliding_policy_extends_on_validate() {
        let f = fixture(SessionPolicy {
            ttl: TimeDelta::minutes(30),
            sliding: true,
        });
        let session = f.manager.create(&f.user).unwrap();
        f.clock.advance(TimeDelta::minutes(20));
        let Validation::Valid(renewed) = f.manager.validate(&session.token) else {
            panic!("expected valid session");
        };
        assert_eq!(renewed.expires_at, f.clock.now() + TimeDelta::minutes(30));
        f.clock.advance(TimeDelta::minutes(25));
        assert!(f.manager.validate(&session.token).is_valid());
    }

    #[test]
    fn fixed_policy_does_not_extend_on_validate() {
        let f = fixture(SessionPolicy {
            ttl: TimeDelta::minutes(30),
            sliding: false,
        });
        let session = f.manager.create(&f.user).unwrap();
        f.clock.advance(TimeDelta::minutes(20));
        let _ = f.manager.validate(&session.token);
        f.clock.advance(TimeDelta::minutes(15));
        assert_eq!(f.manager.validate(&session.token), Validation::Expired);
    }

    #[test]
    fn explicit_extend_never_shortens() {
        let f = fixture(SessionPolicy {
            ttl: TimeDelta::hours(1),
            sliding: false,
        });
        let long = f
            .manager
            .create_with_ttl(&f.user, TimeDelta::hours(10))
            .unwrap();
        assert_eq!(f.manager.extend(&long.token), Some(long.expires_at));
    }

    #[test]
    fn collisions_retry_then_conflict() {
        let f = fixture(SessionPolicy::default());
        let manager = f
            .manager
            .with_token_generator(Arc::new(Scripted(Mutex::new(vec!["b", "a", "a"]))));
        assert_eq!(manager.create(&f.user).unwrap().token, "a");
        // Next draws are "a" (collision) then "b".
        assert_eq!(manager.create(&f.user).unwrap().token, "b");

        let stuck = Arc::new(Scripted(Mutex::new(vec!["a", "a", "a"])));
        let manager = manager.with_token_generator(stuck);
        assert_matches!(manager.create(&f.user), Err(LexisError::Conflict(_)));
    }

    #[test]
    fn unknown_user_cannot_get_a_session() {
        let f = fixture(SessionPolicy::default());
        assert_matches!(f.manager.create(&UserId::new()), Err(LexisError::NotFound(_)));
    }

    #[test]
    fn connection_cleanup_is_idempotent() {
        let f = fixture(SessionPolicy::default());
        let session = f.manager.create(&f.user).unwrap();
        let conn = ConnectionId::new();
        assert!(f.manager.associate(&session.token, &conn));
        assert_eq!(f.manager.token_for_connection(&conn), Some(session.token.clone()));
        assert!(f.manager.invalidate_by_connection(&conn).is_some());
        assert!(f.manager.invalidate_by_connection(&conn).is_none());
        assert!(f.manager.invalidate(&session.token).is_none());
    }

    proptest! {
        #[test]
        fn valid_exactly_until_expiry(ttl_secs in 1i64..86_400, offset_ms in -5_000i64..5_000) {
            let f = fixture(SessionPolicy { ttl: TimeDelta::seconds(ttl_secs), sliding: false });
            let session = f.manager.create(&f.user).unwrap();
            f.clock.set(session.expires_at + TimeDelta::milliseconds(offset_ms));
            let valid = f.manager.validate(&session.token).is_valid();
            prop_assert_eq!(valid, offset_ms <= 0);
        }
    }
}
