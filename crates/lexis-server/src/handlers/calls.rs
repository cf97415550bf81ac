//! Voice call signalling. Every state change is pushed to the other party.

use lexis_core::entities::VoiceCall;
use lexis_core::ids::{CallId, UserId};
use lexis_core::{LexisError, Result};
use lexis_protocol::params::{require, require_parsed};
use lexis_protocol::PushType;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::to_value;
use crate::context::ServerContext;
use crate::dispatch::{Handler, RequestContext};

/// End whatever call `user` is in and tell the peer. Used when the user
/// logs out or disconnects.
pub(crate) fn hang_up(server: &ServerContext, user: &UserId) {
    let Some(call) = server.services.calls.end_for_user(user) else {
        return;
    };
    if let Some(peer) = call.peer_of(user) {
        debug!(call_id = %call.call_id, peer = %peer, "call ended by disconnect");
        let _ = server.push.push(
            peer,
            PushType::VoiceCallEnded,
            json!({"callId": call.call_id, "endedBy": user, "reason": "disconnected"}),
        );
    }
}

fn call_body(call: &VoiceCall) -> Result<Value> {
    Ok(json!({"call": to_value(call)?}))
}

pub struct InitiateHandler;

impl Handler for InitiateHandler {
    #[instrument(skip_all, fields(method = "VOICE_CALL_INITIATE"))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let server = ctx.server;
        let caller = ctx.user_id()?;
        let callee = require_parsed::<UserId>(body, "calleeId")?;
        let call = server.services.calls.initiate(caller, &callee)?;

        let caller_name = server
            .repos
            .users
            .find_by_id(caller)
            .map(|u| u.fullname)
            .unwrap_or_default();
        let rang = server.push.push(
            &callee,
            PushType::VoiceCallIncoming,
            json!({
                "callId": call.call_id,
                "callerId": caller,
                "callerName": caller_name,
            }),
        );
        if !rang {
            // Callee vanished between the online check and the push.
            let _ = server.services.calls.end(caller, &call.call_id);
            return Err(LexisError::conflict("User is not online"));
        }
        call_body(&call)
    }
}

pub struct AcceptHandler;

impl Handler for AcceptHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let user = ctx.user_id()?;
        let call_id = require_parsed::<CallId>(body, "callId")?;
        let call = ctx.server.services.calls.accept(user, &call_id)?;
        let _ = ctx.server.push.push(
            &call.caller_id,
            PushType::VoiceCallAccepted,
            json!({"callId": call.call_id, "calleeId": call.callee_id}),
        );
        call_body(&call)
    }
}

pub struct RejectHandler;

impl Handler for RejectHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let user = ctx.user_id()?;
        let call_id = require_parsed::<CallId>(body, "callId")?;
        let call = ctx.server.services.calls.reject(user, &call_id)?;
        let _ = ctx.server.push.push(
            &call.caller_id,
            PushType::VoiceCallRejected,
            json!({"callId": call.call_id, "calleeId": call.callee_id}),
        );
        Ok(json!({"callId": call.call_id, "rejected": true}))
    }
}

pub struct EndHandler;

impl Handler for EndHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let user = ctx.user_id()?;
        let call_id = require_parsed::<CallId>(body, "callId")?;
        let call = ctx.server.services.calls.end(user, &call_id)?;
        if let Some(peer) = call.peer_of(user) {
            let _ = ctx.server.push.push(
                peer,
                PushType::VoiceCallEnded,
                json!({"callId": call.call_id, "endedBy": user, "reason": "hangup"}),
            );
        }
        Ok(json!({"callId": call.call_id, "ended": true}))
    }
}

/// Relays an opaque signalling blob (SDP offer/answer, ICE candidate).
pub struct SignalHandler;

impl Handler for SignalHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let user = ctx.user_id()?;
        let call_id = require_parsed::<CallId>(body, "callId")?;
        let signal = require(body, "signal")?;
        if !signal.is_object() {
            return Err(LexisError::validation("Field 'signal' must be an object"));
        }
        let call = ctx.server.services.calls.signal(user, &call_id)?;
        let relayed = call.peer_of(user).is_some_and(|peer| {
            ctx.server.push.push(
                peer,
                PushType::VoiceCallSignal,
                json!({"callId": call.call_id, "fromUserId": user, "signal": signal}),
            )
        });
        Ok(json!({"callId": call.call_id, "relayed": relayed}))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::harness;
    use lexis_core::entities::Role;
    use serde_json::json;

    #[test]
    fn full_call_flow_pushes_each_transition() {
        let h = harness();
        let mut alice = h.login_as("alice@x.com", Role::Student);
        let mut bob = h.login_as("bob@x.com", Role::Student);

        let data = h.ok(&alice, "VOICE_CALL_INITIATE_REQUEST", json!({"calleeId": bob.id()}));
        let call_id = data["call"]["callId"].as_str().unwrap().to_owned();
        assert_eq!(data["call"]["state"], "ringing");

        let ring = bob.next_push();
        assert_eq!(ring.message_type, "VOICE_CALL_INCOMING");
        assert_eq!(ring.data()["callerName"], "alice");

        let data = h.ok(&bob, "VOICE_CALL_ACCEPT_REQUEST", json!({"callId": call_id}));
        assert_eq!(data["call"]["state"], "active");
        assert_eq!(alice.next_push().message_type, "VOICE_CALL_ACCEPTED");

        let data = h.ok(
            &alice,
            "VOICE_CALL_SIGNAL_REQUEST",
            json!({"callId": call_id, "signal": {"sdp": "offer"}}),
        );
        assert_eq!(data["relayed"], true);
        let sig = bob.next_push();
        assert_eq!(sig.data()["signal"]["sdp"], "offer");

        let _ = h.ok(&bob, "VOICE_CALL_END_REQUEST", json!({"callId": call_id}));
        let ended = alice.next_push();
        assert_eq!(ended.message_type, "VOICE_CALL_ENDED");
        assert_eq!(ended.data()["reason"], "hangup");
    }

    #[test]
    fn reject_and_offline_callee() {
        let h = harness();
        let mut alice = h.login_as("alice@x.com", Role::Student);
        let mut bob = h.login_as("bob@x.com", Role::Student);

        let data = h.ok(&alice, "VOICE_CALL_INITIATE_REQUEST", json!({"calleeId": bob.id()}));
        let call_id = data["call"]["callId"].as_str().unwrap().to_owned();
        let _ = bob.next_push();

        assert_eq!(
            h.err(&alice, "VOICE_CALL_ACCEPT_REQUEST", json!({"callId": call_id})),
            "PERMISSION_DENIED"
        );
        let _ = h.ok(&bob, "VOICE_CALL_REJECT_REQUEST", json!({"callId": call_id}));
        assert_eq!(alice.next_push().message_type, "VOICE_CALL_REJECTED");

        let _ = h.ok(&bob, "LOGOUT_REQUEST", json!({}));
        assert_eq!(
            h.err(&alice, "VOICE_CALL_INITIATE_REQUEST", json!({"calleeId": bob.id()})),
            "CONFLICT"
        );
    }

    #[test]
    fn logout_ends_call_and_notifies_peer() {
        let h = harness();
        let mut alice = h.login_as("alice@x.com", Role::Student);
        let mut bob = h.login_as("bob@x.com", Role::Student);
        let _ = h.ok(&alice, "VOICE_CALL_INITIATE_REQUEST", json!({"calleeId": bob.id()}));
        let _ = bob.next_push();

        let _ = h.ok(&bob, "LOGOUT_REQUEST", json!({}));
        let ended = alice.next_push();
        assert_eq!(ended.message_type, "VOICE_CALL_ENDED");
        assert_eq!(ended.data()["reason"], "disconnected");
        assert!(h.server.repos.calls.call_for_user(&alice.user.as_ref().unwrap().id).is_none());
    }
}
