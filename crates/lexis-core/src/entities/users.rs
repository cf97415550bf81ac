use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wire_enum;
use crate::ids::{ConnectionId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

wire_enum!(Role, "role", {
    Student => "student",
    Teacher => "teacher",
    Admin => "admin",
});

impl Role {
    /// Teachers and admins manage content and review work.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Teacher | Self::Admin)
    }

    /// Roles a user may pick for themselves at registration.
    pub fn self_assignable(&self) -> bool {
        !matches!(self, Self::Admin)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

wire_enum!(Level, "level", {
    Beginner => "beginner",
    Intermediate => "intermediate",
    Advanced => "advanced",
});

/// A registered account.
///
/// `online` and `connection` move together: a connection is recorded exactly
/// when the user is online.
#[derive(Clone)]
pub struct User {
    pub id: UserId,
    pub fullname: String,
    pub email: String,
    pub password: String,
    pub level: Level,
    pub role: Role,
    pub online: bool,
    pub connection: Option<ConnectionId>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("online", &self.online)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.id.clone(),
            fullname: self.fullname.clone(),
            email: self.email.clone(),
            level: self.level,
            role: self.role,
            online: self.online,
            created_at: self.created_at,
            last_login_at: self.last_login_at,
        }
    }
}

/// Wire view of a user. Never carries the password or socket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    pub fullname: String,
    pub email: String,
    pub level: Level,
    pub role: Role,
    pub online: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Fields supplied at registration.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub fullname: String,
    pub email: String,
    pub password: String,
    pub level: Level,
    pub role: Role,
}

/// Self-service profile changes. Email and role are not editable here.
#[derive(Clone, Debug, Default)]
pub struct UserPatch {
    pub fullname: Option<String>,
    pub level: Option<Level>,
    pub password: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.fullname.is_none() && self.level.is_none() && self.password.is_none()
    }

    pub fn apply(self, user: &mut User) {
        if let Some(v) = self.fullname {
            user.fullname = v;
        }
        if let Some(v) = self.level {
            user.level = v;
        }
        if let Some(v) = self.password {
            user.password = v;
        }
    }
}
