use lexis_core::entities::{NewUser, Role, User, UserPatch};
use lexis_core::ids::{ConnectionId, UserId};
use tracing::instrument;

use crate::error::StoreError;
use crate::store::EntityStore;

/// Trim and lowercase an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` if the email is already registered.
    fn create(&self, new: NewUser) -> Result<User, StoreError>;
    fn find_by_id(&self, id: &UserId) -> Option<User>;
    fn find_by_email(&self, email: &str) -> Option<User>;
    fn find_all(&self) -> Vec<User>;
    fn find_by_role(&self, role: Role) -> Vec<User>;
    fn update_profile(&self, id: &UserId, patch: UserPatch) -> Result<User, StoreError>;
    fn set_role(&self, id: &UserId, role: Role) -> Result<User, StoreError>;

    /// Mark the user online on `connection`. Returns the connection it
    /// replaced, if any.
    fn set_online(
        &self,
        id: &UserId,
        connection: &ConnectionId,
    ) -> Result<Option<ConnectionId>, StoreError>;

    /// Mark the user offline only if `connection` is still their current one.
    fn set_offline_if_current(&self, id: &UserId, connection: &ConnectionId) -> bool;

    /// Mark the user offline regardless of connection.
    fn set_offline(&self, id: &UserId) -> bool;

    fn online_users(&self) -> Vec<User>;

    /// The connection that currently owns this user, if they are online.
    fn connection_of(&self, id: &UserId) -> Option<ConnectionId>;
}

pub struct MemoryUserRepo {
    store: EntityStore,
}

impl MemoryUserRepo {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

fn sorted(mut users: Vec<User>) -> Vec<User> {
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    users
}

impl UserRepository for MemoryUserRepo {
    #[instrument(skip(self, new), fields(email = %new.email))]
    fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let user = User {
            id: UserId::new(),
            fullname: new.fullname,
            email: normalize_email(&new.email),
            password: new.password,
            level: new.level,
            role: new.role,
            online: false,
            connection: None,
            created_at: self.store.now(),
            last_login_at: None,
        };
        let inserted = self.store.with_users(|t| t.insert_if_absent(user.clone()));
        if inserted {
            Ok(user)
        } else {
            Err(StoreError::Conflict("Email already registered".into()))
        }
    }

    fn find_by_id(&self, id: &UserId) -> Option<User> {
        self.store.with_users(|t| t.by_id.get(id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        let email = normalize_email(email);
        self.store.with_users(|t| {
            t.by_email
                .get(&email)
                .and_then(|id| t.by_id.get(id))
                .cloned()
        })
    }

    fn find_all(&self) -> Vec<User> {
        sorted(self.store.with_users(|t| t.by_id.values().cloned().collect()))
    }

    fn find_by_role(&self, role: Role) -> Vec<User> {
        sorted(self.store.with_users(|t| {
            t.by_id.values().filter(|u| u.role == role).cloned().collect()
        }))
    }

    fn update_profile(&self, id: &UserId, patch: UserPatch) -> Result<User, StoreError> {
        self.store.with_users(|t| {
            let user = t
                .by_id
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound("User not found".into()))?;
            patch.apply(user);
            Ok(user.clone())
        })
    }

    #[instrument(skip(self), fields(user_id = %id, role = %role))]
    fn set_role(&self, id: &UserId, role: Role) -> Result<User, StoreError> {
        self.store.with_users(|t| {
            let user = t
                .by_id
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound("User not found".into()))?;
            user.role = role;
            Ok(user.clone())
        })
    }

    fn set_online(
        &self,
        id: &UserId,
        connection: &ConnectionId,
    ) -> Result<Option<ConnectionId>, StoreError> {
        let now = self.store.now();
        self.store.with_users(|t| {
            let user = t
                .by_id
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound("User not found".into()))?;
            let previous = user.connection.replace(connection.clone());
            user.online = true;
            user.last_login_at = Some(now);
            Ok(previous.filter(|prev| prev != connection))
        })
    }

    fn set_offline_if_current(&self, id: &UserId, connection: &ConnectionId) -> bool {
        self.store.with_users(|t| match t.by_id.get_mut(id) {
            Some(user) if user.connection.as_ref() == Some(connection) => {
                user.online = false;
                user.connection = None;
                true
            }
            _ => false,
        })
    }

    fn set_offline(&self, id: &UserId) -> bool {
        self.store.with_users(|t| match t.by_id.get_mut(id) {
            Some(user) if user.online => {
                user.online = false;
                user.connection = None;
                true
            }
            _ => false,
        })
    }

    fn online_users(&self) -> Vec<User> {
        sorted(self.store.with_users(|t| {
            t.by_id.values().filter(|u| u.online).cloned().collect()
        }))
    }

    fn connection_of(&self, id: &UserId) -> Option<ConnectionId> {
        self.store.with_users(|t| {
            t.by_id
                .get(id)
                .filter(|u| u.online)
                .and_then(|u| u.connection.clone())
        })
    }
}
