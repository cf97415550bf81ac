//! Account handlers: register, login, logout, profiles and roles.

use lexis_core::entities::{Level, Role, UserPatch, UserProfile};
use lexis_core::ids::UserId;
use lexis_core::Result;
use lexis_protocol::params::{optional_parsed, optional_str, require_parsed, require_str};
use lexis_protocol::PushType;
use lexis_services::Registration;
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::calls::hang_up;
use super::to_value;
use crate::dispatch::{AccessPolicy, Handler, RequestContext, ADMIN, STAFF};

fn profiles(users: Vec<lexis_core::entities::User>) -> Vec<UserProfile> {
    users.iter().map(|u| u.profile()).collect()
}

pub struct RegisterHandler;

impl Handler for RegisterHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Public
    }

    #[instrument(skip_all, fields(method = "REGISTER"))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let user = ctx.server.services.accounts.register(Registration {
            fullname: require_str(body, "fullname")?.to_owned(),
            email: require_str(body, "email")?.to_owned(),
            password: require_str(body, "password")?.to_owned(),
            level: optional_parsed::<Level>(body, "level")?,
            role: optional_parsed::<Role>(body, "role")?,
        })?;
        Ok(json!({
            "userId": user.id,
            "user": user.profile(),
        }))
    }
}

/// Authenticates, binds the session to this socket and takes over any
/// socket the user was previously logged in on.
pub struct LoginHandler;

impl Handler for LoginHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Public
    }

    #[instrument(skip_all, fields(method = "LOGIN", connection_id = %ctx.connection.id()))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let server = ctx.server;
        let accounts = &server.services.accounts;
        let (user, session) = accounts.login(
            require_str(body, "email")?,
            require_str(body, "password")?,
        )?;

        let bound = ctx.connection.user();
        let attached = match accounts.attach(&session, ctx.connection.id(), bound.as_ref()) {
            Ok(a) => a,
            Err(e) => {
                let _ = server.sessions.invalidate(&session.token);
                return Err(e);
            }
        };
        ctx.connection.bind_user(user.id.clone());

        if let Some(replaced) = &attached.replaced_user {
            hang_up(server, replaced);
        }
        if let Some(previous) = &attached.superseded {
            if let Some(old) = server.connections.get(previous) {
                let _ = old.clear_user(&user.id);
            }
            let _ = server.push.push_to_connection(
                previous,
                PushType::SessionSuperseded,
                json!({
                    "userId": user.id,
                    "message": "Logged in from another connection",
                }),
            );
        }

        // Re-read so the profile reflects the online flag and login time.
        let profile = server
            .repos
            .users
            .find_by_id(&user.id)
            .map(|u| u.profile())
            .unwrap_or_else(|| user.profile());
        Ok(json!({
            "userId": user.id,
            "sessionToken": session.token,
            "expiresAt": session.expires_at,
            "user": profile,
        }))
    }
}

pub struct LogoutHandler;

impl Handler for LogoutHandler {
    #[instrument(skip_all, fields(method = "LOGOUT"))]
    fn handle(&self, ctx: &RequestContext<'_>, _body: &Value) -> Result<Value> {
        let server = ctx.server;
        let session = ctx.session()?;
        let elsewhere = server
            .services
            .accounts
            .logout(session, ctx.connection.id());
        let _ = ctx.connection.clear_user(&session.user_id);
        if let Some(other) = elsewhere.and_then(|id| server.connections.get(&id)) {
            let _ = other.clear_user(&session.user_id);
        }
        if server.repos.users.connection_of(&session.user_id).is_none() {
            hang_up(server, &session.user_id);
        }
        Ok(json!({"loggedOut": true}))
    }
}

/// Own profile, or another user's when `userId` is given.
pub struct GetProfileHandler;

impl Handler for GetProfileHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let target = match optional_parsed::<UserId>(body, "userId")? {
            Some(id) => id,
            None => ctx.user_id()?.clone(),
        };
        let user = ctx.server.services.accounts.profile(&target)?;
        Ok(json!({"user": user.profile()}))
    }
}

pub struct UpdateProfileHandler;

impl Handler for UpdateProfileHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let patch = UserPatch {
            fullname: optional_str(body, "fullname")?.map(str::to_owned),
            level: optional_parsed::<Level>(body, "level")?,
            password: optional_str(body, "password")?.map(str::to_owned),
        };
        let user = ctx
            .server
            .services
            .accounts
            .update_profile(ctx.user_id()?, patch)?;
        Ok(json!({"user": user.profile()}))
    }
}

pub struct GetOnlineUsersHandler;

impl Handler for GetOnlineUsersHandler {
    fn handle(&self, ctx: &RequestContext<'_>, _body: &Value) -> Result<Value> {
        let users = profiles(ctx.server.services.accounts.online_users());
        Ok(json!({"count": users.len(), "users": to_value(&users)?}))
    }
}

pub struct ListUsersHandler;

impl Handler for ListUsersHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(STAFF)
    }

    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let role = optional_parsed::<Role>(body, "role")?;
        let users = profiles(ctx.server.services.accounts.list_users(role));
        Ok(json!({"count": users.len(), "users": to_value(&users)?}))
    }
}

pub struct SetUserRoleHandler;

impl Handler for SetUserRoleHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(ADMIN)
    }

    #[instrument(skip_all, fields(method = "SET_USER_ROLE"))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let target = require_parsed::<UserId>(body, "userId")?;
        let role = require_parsed::<Role>(body, "role")?;
        let user = ctx
            .server
            .services
            .accounts
            .set_role(ctx.user_id()?, &target, role)?;
        info!(target = %target, %role, "role changed");
        Ok(json!({"user": user.profile()}))
    }
}
