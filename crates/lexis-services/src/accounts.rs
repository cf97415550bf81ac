//! Registration, login and the user ↔ connection binding.

use std::sync::Arc;

use lexis_auth::SessionManager;
use lexis_core::entities::{Level, NewUser, Role, Session, User, UserPatch};
use lexis_core::ids::{ConnectionId, UserId};
use lexis_core::{LexisError, Result};
use lexis_store::UserRepository;
use tracing::{debug, info, instrument};

use crate::validate::non_blank;

/// Wire message for every failed credential check.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone, Debug)]
pub struct Registration {
    pub fullname: String,
    pub email: String,
    pub password: String,
    pub level: Option<Level>,
    pub role: Option<Role>,
}

/// What the login binding displaced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attached {
    /// The user's previous socket, now logged out.
    pub superseded: Option<ConnectionId>,
    /// Another user who was logged in on this same socket.
    pub replaced_user: Option<UserId>,
}

/// Outcome of tearing a connection down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Detached {
    pub user_id: UserId,
    /// False when the user had already moved to another connection.
    pub went_offline: bool,
}

pub struct AccountService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<SessionManager>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepository>, sessions: Arc<SessionManager>) -> Self {
        Self { users, sessions }
    }

    #[instrument(skip_all, fields(email = %reg.email))]
    pub fn register(&self, reg: Registration) -> Result<User> {
        let fullname = non_blank("fullname", &reg.fullname)?;
        let email = non_blank("email", &reg.email)?;
        if !email.contains('@') {
            return Err(LexisError::validation("Invalid email address"));
        }
        if reg.password.is_empty() {
            return Err(LexisError::validation("Missing required field: password"));
        }
        let role = reg.role.unwrap_or(Role::Student);
        if !role.self_assignable() {
            return Err(LexisError::validation(format!(
                "Role cannot be self-assigned: {role}"
            )));
        }
        let user = self.users.create(NewUser {
            fullname: fullname.to_owned(),
            email: email.to_owned(),
            password: reg.password,
            level: reg.level.unwrap_or(Level::Beginner),
            role,
        })?;
        info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Check credentials and issue a session. Unknown email and wrong
    /// password are indistinguishable to the caller.
    pub fn login(&self, email: &str, password: &str) -> Result<(User, Session)> {
        let user = self
            .users
            .find_by_email(email)
            .filter(|u| u.password == password)
            .ok_or_else(|| {
                debug!("login rejected");
                LexisError::unauthenticated(INVALID_CREDENTIALS)
            })?;
        let session = self.sessions.create(&user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok((user, session))
    }

    /// Bind a fresh session to the socket it arrived on and mark the user
    /// online there. A previous socket of the same user loses its session.
    ///
    /// `bound_user` is whoever the socket was serving before this login. It
    /// covers an occupant whose session was already swept.
    pub fn attach(
        &self,
        session: &Session,
        connection: &ConnectionId,
        bound_user: Option<&UserId>,
    ) -> Result<Attached> {
        let mut attached = Attached::default();
        let from_session = self
            .sessions
            .invalidate_by_connection(connection)
            .map(|s| s.user_id);
        for previous in from_session.into_iter().chain(bound_user.cloned()) {
            if previous != session.user_id
                && self.users.set_offline_if_current(&previous, connection)
            {
                attached.replaced_user = Some(previous);
            }
        }
        if !self.sessions.associate(&session.token, connection) {
            return Err(LexisError::unauthenticated(lexis_auth::INVALID_SESSION));
        }
        attached.superseded = self.users.set_online(&session.user_id, connection)?;
        if let Some(prev) = &attached.superseded {
            let _ = self.sessions.invalidate_by_connection(prev);
            info!(user_id = %session.user_id, superseded = %prev, "login superseded older connection");
        }
        Ok(attached)
    }

    /// End the session and take the user offline. Returns the socket the
    /// session was bound to when that is not `connection`, so the caller
    /// can unbind it too.
    pub fn logout(&self, session: &Session, connection: &ConnectionId) -> Option<ConnectionId> {
        let bound = self
            .sessions
            .invalidate(&session.token)
            .and_then(|s| s.connection)
            .filter(|c| c != connection);
        let _ = self.users.set_offline_if_current(&session.user_id, connection);
        if let Some(other) = &bound {
            let _ = self.users.set_offline_if_current(&session.user_id, other);
        }
        info!(user_id = %session.user_id, "user logged out");
        bound
    }

    /// Disconnect cleanup. `known_user` covers sessions that were swept
    /// while the socket stayed open.
    pub fn detach(
        &self,
        connection: &ConnectionId,
        known_user: Option<&UserId>,
    ) -> Option<Detached> {
        let from_session = self
            .sessions
            .invalidate_by_connection(connection)
            .map(|s| s.user_id);
        let user_id = from_session.or_else(|| known_user.cloned())?;
        let went_offline = self.users.set_offline_if_current(&user_id, connection);
        Some(Detached {
            user_id,
            went_offline,
        })
    }

    pub fn profile(&self, id: &UserId) -> Result<User> {
        self.users
            .find_by_id(id)
            .ok_or_else(|| LexisError::not_found("User not found"))
    }

    pub fn update_profile(&self, id: &UserId, patch: UserPatch) -> Result<User> {
        if patch.is_empty() {
            return Err(LexisError::validation("Nothing to update"));
        }
        if let Some(name) = &patch.fullname {
            let _ = non_blank("fullname", name)?;
        }
        if patch.password.as_deref() == Some("") {
            return Err(LexisError::validation("Password cannot be empty"));
        }
        Ok(self.users.update_profile(id, patch)?)
    }

    pub fn set_role(&self, actor: &UserId, target: &UserId, role: Role) -> Result<User> {
        if actor == target {
            return Err(LexisError::validation("You cannot change your own role"));
        }
        let user = self.users.set_role(target, role)?;
        info!(actor = %actor, user_id = %target, role = %role, "role changed");
        Ok(user)
    }

    pub fn role_of(&self, id: &UserId) -> Option<Role> {
        self.users.find_by_id(id).map(|u| u.role)
    }

    pub fn online_users(&self) -> Vec<User> {
        self.users.online_users()
    }

    pub fn list_users(&self, role: Option<Role>) -> Vec<User> {
        match role {
            Some(role) => self.users.find_by_role(role),
            None => self.users.find_all(),
        }
    }
}
