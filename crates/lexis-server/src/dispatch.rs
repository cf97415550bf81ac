//! Request dispatch: frame → handler → envelope.
//!
//! The dispatcher owns every precondition that is not domain logic:
//! parsing, message type resolution, session validation and role checks.
//! Failures there answer `ERROR_RESPONSE`. Once a handler runs, its result
//! (success or error) answers with the request's own `<BASE>_RESPONSE`.

use std::collections::HashMap;
use std::sync::Arc;

use lexis_core::entities::{Role, Session};
use lexis_core::ids::UserId;
use lexis_core::{ErrorKind, LexisError, Result};
use lexis_protocol::{Envelope, Request, RequestType, ERROR_RESPONSE};
use serde_json::Value;
use tracing::{debug, instrument, warn, Span};

use crate::connection::Connection;
use crate::context::ServerContext;
use crate::handlers;

/// Roles allowed to manage content and review work.
pub const STAFF: &[Role] = &[Role::Teacher, Role::Admin];
pub const ADMIN: &[Role] = &[Role::Admin];

/// Who may invoke a handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessPolicy {
    /// No session required.
    Public,
    /// Any valid session.
    Authenticated,
    /// Valid session whose user currently holds one of these roles.
    Roles(&'static [Role]),
}

/// Implemented by every request handler.
pub trait Handler: Send + Sync {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Authenticated
    }

    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value>;
}

/// What a handler knows about the request it is serving.
pub struct RequestContext<'a> {
    pub server: &'a ServerContext,
    pub connection: &'a Arc<Connection>,
    /// Present for every non-public handler.
    pub session: Option<Session>,
    /// The caller's role as of this request.
    pub role: Option<Role>,
    pub message_id: Option<String>,
}

impl RequestContext<'_> {
    pub fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| LexisError::unauthenticated(lexis_auth::INVALID_SESSION))
    }

    pub fn user_id(&self) -> Result<&UserId> {
        Ok(&self.session()?.user_id)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_some_and(|r| r.is_staff())
    }
}

/// Handlers keyed by request type.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<RequestType, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: RequestType, handler: impl Handler + 'static) {
        let _ = self.handlers.insert(kind, Arc::new(handler));
    }

    pub fn get(&self, kind: RequestType) -> Option<Arc<dyn Handler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn has(&self, kind: RequestType) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered request names, sorted.
    pub fn request_types(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

pub struct Dispatcher {
    server: Arc<ServerContext>,
    registry: HandlerRegistry,
}

impl Dispatcher {
    /// Dispatcher with every built-in handler registered.
    pub fn new(server: Arc<ServerContext>) -> Self {
        let mut registry = HandlerRegistry::new();
        handlers::register_all(&mut registry);
        Self::with_registry(server, registry)
    }

    pub fn with_registry(server: Arc<ServerContext>, registry: HandlerRegistry) -> Self {
        Self { server, registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Turn one frame into exactly one response envelope. Never fails:
    /// every error becomes an error envelope.
    #[instrument(
        skip_all,
        fields(connection_id = %connection.id(), message_type, message_id)
    )]
    pub fn dispatch(&self, connection: &Arc<Connection>, line: &str) -> Envelope {
        let _ = connection.record_request();
        let request = match Request::parse(line) {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "unparseable frame");
                return self.reject(Request::salvage_message_id(line), e.into());
            }
        };
        let span = Span::current();
        let _ = span.record("message_type", request.message_type.as_str());
        if let Some(id) = &request.message_id {
            let _ = span.record("message_id", id.as_str());
        }

        let kind = match request.message_type.parse::<RequestType>() {
            Ok(k) => k,
            Err(msg) => {
                debug!("unknown message type");
                return self.reject(request.message_id, LexisError::validation(msg));
            }
        };
        let Some(handler) = self.registry.get(kind) else {
            warn!("no handler registered");
            return self.reject(
                request.message_id,
                LexisError::validation(format!("Unsupported message type: {kind}")),
            );
        };

        let ctx = match self.authorize(connection, &request, handler.access()) {
            Ok(ctx) => ctx,
            Err(e) => return self.reject(request.message_id, e),
        };

        debug!("dispatching");
        let now = self.server.now();
        match handler.handle(&ctx, &request.body) {
            Ok(data) => {
                self.server.stats.request(true);
                Envelope::success(kind.response_type(), ctx.message_id, data, now)
            }
            Err(e) => {
                self.server.stats.request(false);
                if e.kind() == ErrorKind::Internal {
                    warn!(error = %e, "handler failed");
                } else {
                    debug!(error = %e, "handler rejected request");
                }
                Envelope::error(kind.response_type(), ctx.message_id, &e, now)
            }
        }
    }

    fn authorize<'a>(
        &'a self,
        connection: &'a Arc<Connection>,
        request: &Request,
        policy: AccessPolicy,
    ) -> Result<RequestContext<'a>> {
        let mut ctx = RequestContext {
            server: &self.server,
            connection,
            session: None,
            role: None,
            message_id: request.message_id.clone(),
        };
        if policy == AccessPolicy::Public {
            return Ok(ctx);
        }

        let session = self
            .server
            .sessions
            .authenticate(request.session_token.as_deref())?;
        // Role is read fresh so changes apply without re-login.
        let role = self
            .server
            .repos
            .users
            .find_by_id(&session.user_id)
            .map(|u| u.role)
            .ok_or_else(|| LexisError::unauthenticated(lexis_auth::INVALID_SESSION))?;
        if let AccessPolicy::Roles(allowed) = policy {
            if !allowed.contains(&role) {
                debug!(user_id = %session.user_id, %role, "role check failed");
                return Err(LexisError::forbidden(format!(
                    "Requires role: {}",
                    allowed
                        .iter()
                        .map(Role::as_str)
                        .collect::<Vec<_>>()
                        .join(" or ")
                )));
            }
        }
        ctx.session = Some(session);
        ctx.role = Some(role);
        Ok(ctx)
    }

    fn reject(&self, message_id: Option<String>, err: LexisError) -> Envelope {
        self.server.stats.request(false);
        Envelope::error(ERROR_RESPONSE, message_id, &err, self.server.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::connection::tests::loopback;
    use lexis_core::entities::{Level, NewUser};
    use lexis_protocol::Status;
    use serde_json::json;

    struct Echo;

    impl Handler for Echo {
        fn access(&self) -> AccessPolicy {
            AccessPolicy::Public
        }

        fn handle(&self, _ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
            Ok(body.clone())
        }
    }

    struct WhoAmI;

    impl Handler for WhoAmI {
        fn handle(&self, ctx: &RequestContext<'_>, _body: &Value) -> Result<Value> {
            Ok(json!({"userId": ctx.user_id()?, "staff": ctx.is_staff()}))
        }
    }

    struct StaffOnly;

    impl Handler for StaffOnly {
        fn access(&self) -> AccessPolicy {
            AccessPolicy::Roles(STAFF)
        }

        fn handle(&self, _ctx: &RequestContext<'_>, _body: &Value) -> Result<Value> {
            Err(LexisError::not_found("Lesson not found"))
        }
    }

    fn setup() -> (Dispatcher, Arc<Connection>, Arc<ServerContext>) {
        let server = Arc::new(ServerContext::in_memory(ServerConfig::default()));
        let mut registry = HandlerRegistry::new();
        registry.register(RequestType::Ping, Echo);
        registry.register(RequestType::GetProfile, WhoAmI);
        registry.register(RequestType::CreateLesson, StaffOnly);
        let (conn, _reader) = loopback();
        (
            Dispatcher::with_registry(Arc::clone(&server), registry),
            Arc::new(conn),
            server,
        )
    }

    fn login(server: &ServerContext, role: Role) -> String {
        let user = server
            .repos
            .users
            .create(NewUser {
                fullname: "T".into(),
                email: format!("{}@x.com", UserId::new()),
                password: "pw".into(),
                level: Level::Beginner,
                role,
            })
            .unwrap();
        server.sessions.create(&user.id).unwrap().token
    }

    #[test]
    fn garbage_answers_error_response_with_salvaged_id() {
        let (d, conn, _) = setup();
        let env = d.dispatch(&conn, r#"{"messageId":"9","messageType":42}"#);
        assert_eq!(env.message_type, ERROR_RESPONSE);
        assert_eq!(env.message_id.as_deref(), Some("9"));
        assert_eq!(env.payload.code.as_deref(), Some("VALIDATION_ERROR"));

        let env = d.dispatch(&conn, "not json");
        assert_eq!(env.message_type, ERROR_RESPONSE);
        assert!(env.message_id.is_none());
    }

    #[test]
    fn unknown_and_unregistered_types_are_rejected() {
        let (d, conn, _) = setup();
        let env = d.dispatch(&conn, r#"{"messageType":"FLY_REQUEST","messageId":"1"}"#);
        assert_eq!(env.message_type, ERROR_RESPONSE);
        assert!(env.payload.message.unwrap().contains("FLY_REQUEST"));

        let env = d.dispatch(&conn, r#"{"messageType":"GET_GAMES_REQUEST","messageId":"2"}"#);
        assert_eq!(env.message_type, ERROR_RESPONSE);
    }

    #[test]
    fn public_handler_needs_no_session() {
        let (d, conn, _) = setup();
        let env = d.dispatch(&conn, r#"{"messageType":"PING_REQUEST","messageId":"a","x":1}"#);
        assert_eq!(env.message_type, "PING_RESPONSE");
        assert_eq!(env.message_id.as_deref(), Some("a"));
        assert_eq!(env.data()["x"], 1);
    }

    #[test]
    fn missing_or_bad_token_is_an_auth_error_response() {
        let (d, conn, _) = setup();
        for line in [
            r#"{"messageType":"GET_PROFILE_REQUEST","messageId":"1"}"#,
            r#"{"messageType":"GET_PROFILE_REQUEST","messageId":"1","sessionToken":"nope"}"#,
        ] {
            let env = d.dispatch(&conn, line);
            assert_eq!(env.message_type, ERROR_RESPONSE);
            assert_eq!(env.payload.status, Status::Error);
            assert_eq!(env.payload.message.as_deref(), Some("Invalid or expired session"));
            assert_eq!(env.payload.code.as_deref(), Some("AUTH_ERROR"));
        }
    }

    #[test]
    fn valid_token_reaches_handler() {
        let (d, conn, server) = setup();
        let token = login(&server, Role::Student);
        let line = json!({"messageType": "GET_PROFILE_REQUEST", "messageId": 5, "sessionToken": token});
        let env = d.dispatch(&conn, &line.to_string());
        assert!(env.is_success());
        assert_eq!(env.message_id.as_deref(), Some("5"));
        assert_eq!(env.data()["staff"], false);
    }

    #[test]
    fn role_is_checked_against_current_user_record() {
        let (d, conn, server) = setup();
        let token = login(&server, Role::Student);
        let line = json!({"messageType": "CREATE_LESSON_REQUEST", "messageId": "r", "sessionToken": token})
            .to_string();

        let env = d.dispatch(&conn, &line);
        assert_eq!(env.message_type, ERROR_RESPONSE);
        assert_eq!(env.payload.code.as_deref(), Some("PERMISSION_DENIED"));

        let user = server.sessions.authenticate(Some(&token)).unwrap().user_id;
        let _ = server.repos.users.set_role(&user, Role::Teacher).unwrap();

        // Now past the role gate; the handler's own error uses its response type.
        let env = d.dispatch(&conn, &line);
        assert_eq!(env.message_type, "CREATE_LESSON_RESPONSE");
        assert_eq!(env.payload.code.as_deref(), Some("NOT_FOUND"));
    }

    #[test]
    fn stats_count_requests_and_errors() {
        let (d, conn, server) = setup();
        let _ = d.dispatch(&conn, r#"{"messageType":"PING_REQUEST"}"#);
        let _ = d.dispatch(&conn, r#"{"messageType":"GET_PROFILE_REQUEST"}"#);
        let snap = server.stats.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.request_errors, 1);
        assert_eq!(conn.requests(), 2);
    }
}
