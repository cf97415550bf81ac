use lexis_core::Result;
use serde_json::{json, Value};

use super::to_value;
use crate::dispatch::{AccessPolicy, Handler, RequestContext, ADMIN};

/// Liveness check. Needs no session.
pub struct PingHandler;

impl Handler for PingHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Public
    }

    fn handle(&self, ctx: &RequestContext<'_>, _body: &Value) -> Result<Value> {
        Ok(json!({
            "serverTime": ctx.server.now(),
            "authenticated": ctx.connection.user().is_some(),
        }))
    }
}

pub struct ServerStatsHandler;

impl Handler for ServerStatsHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(ADMIN)
    }

    fn handle(&self, ctx: &RequestContext<'_>, _body: &Value) -> Result<Value> {
        let server = ctx.server;
        let uptime = (server.now() - server.started_at).num_seconds().max(0);
        Ok(json!({
            "uptimeSecs": uptime,
            "connections": {
                "open": server.connections.count(),
                "authenticated": server.connections.authenticated_count(),
            },
            "activeSessions": server.sessions.active_count(),
            "counters": to_value(&server.stats.snapshot())?,
            "store": to_value(&server.store.counts())?,
        }))
    }
}
