//! Direct messages between users.

use lexis_core::ids::UserId;
use lexis_core::Result;
use lexis_protocol::params::{optional_u64, require_parsed, require_str};
use lexis_protocol::PushType;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::to_value;
use crate::dispatch::{AccessPolicy, Handler, RequestContext, ADMIN};

/// Stores the message, then pushes `RECEIVE_MESSAGE` to the recipient's
/// current socket. `delivered` reports whether that push went out.
pub struct SendMessageHandler;

impl Handler for SendMessageHandler {
    #[instrument(skip_all, fields(method = "SEND_MESSAGE"))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let sender = ctx.user_id()?;
        let recipient = require_parsed::<UserId>(body, "recipientId")?;
        let content = require_str(body, "content")?;
        let message = ctx.server.services.chat.send(sender, &recipient, content)?;

        let message_json = to_value(&message)?;
        let delivered =
            ctx.server
                .push
                .push(&recipient, PushType::ReceiveMessage, message_json.clone());
        debug!(message_id = %message.message_id, delivered, "message sent");
        Ok(json!({"message": message_json, "delivered": delivered}))
    }
}

pub struct GetChatHistoryHandler;

impl Handler for GetChatHistoryHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let user = ctx.user_id()?;
        let other = require_parsed::<UserId>(body, "otherUserId")?;
        let limit = optional_u64(body, "limit")?.map(|n| usize::try_from(n).unwrap_or(usize::MAX));
        let messages = ctx.server.services.chat.history(user, &other, limit)?;
        Ok(json!({"count": messages.len(), "messages": to_value(&messages)?}))
    }
}

pub struct MarkMessagesReadHandler;

impl Handler for MarkMessagesReadHandler {
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let other = require_parsed::<UserId>(body, "otherUserId")?;
        let marked = ctx.server.services.chat.mark_read(ctx.user_id()?, &other);
        Ok(json!({"marked": marked}))
    }
}

pub struct GetUnreadCountHandler;

impl Handler for GetUnreadCountHandler {
    fn handle(&self, ctx: &RequestContext<'_>, _body: &Value) -> Result<Value> {
        to_value(&ctx.server.services.chat.unread(ctx.user_id()?))
    }
}

pub struct GetConversationsHandler;

impl Handler for GetConversationsHandler {
    fn handle(&self, ctx: &RequestContext<'_>, _body: &Value) -> Result<Value> {
        let conversations = ctx.server.services.chat.conversations(ctx.user_id()?);
        Ok(json!({"conversations": to_value(&conversations)?}))
    }
}

pub struct PurgeConversationHandler;

impl Handler for PurgeConversationHandler {
    fn access(&self) -> AccessPolicy {
        AccessPolicy::Roles(ADMIN)
    }

    #[instrument(skip_all, fields(method = "PURGE_CONVERSATION"))]
    fn handle(&self, ctx: &RequestContext<'_>, body: &Value) -> Result<Value> {
        let a = require_parsed::<UserId>(body, "userId")?;
        let b = require_parsed::<UserId>(body, "otherUserId")?;
        let purged = ctx.server.services.chat.purge(&a, &b);
        Ok(json!({"purged": purged}))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::harness;
    use lexis_core::entities::Role;
    use serde_json::json;

    #[test]
    fn send_pushes_to_online_recipient() {
        let h = harness();
        let alice = h.login_as("alice@x.com", Role::Student);
        let mut bob = h.login_as("bob@x.com", Role::Student);

        let data = h.ok(
            &alice,
            "SEND_MESSAGE_REQUEST",
            json!({"recipientId": bob.id(), "content": "hello"}),
        );
        assert_eq!(data["delivered"], true);
        let push = bob.next_push();
        assert_eq!(push.message_type, "RECEIVE_MESSAGE");
        assert_eq!(push.data()["content"], "hello");
        assert_eq!(push.data()["senderId"], alice.id());
    }

    #[test]
    fn offline_recipient_finds_message_by_polling() {
        let h = harness();
        let alice = h.login_as("alice@x.com", Role::Student);
        let bob = h.login_as("bob@x.com", Role::Student);
        let _ = h.ok(&bob, "LOGOUT_REQUEST", json!({}));

        for text in ["one", "two"] {
            let data = h.ok(
                &alice,
                "SEND_MESSAGE_REQUEST",
                json!({"recipientId": bob.id(), "content": text}),
            );
            assert_eq!(data["delivered"], false);
        }

        let bob = h.login_as_existing("bob@x.com");
        let unread = h.ok(&bob, "GET_UNREAD_COUNT_REQUEST", json!({}));
        assert_eq!(unread["total"], 2);

        let history = h.ok(&bob, "GET_CHAT_HISTORY_REQUEST", json!({"otherUserId": alice.id()}));
        assert_eq!(history["messages"][0]["content"], "one");
        assert_eq!(history["messages"][1]["content"], "two");

        let marked = h.ok(&bob, "MARK_MESSAGES_READ_REQUEST", json!({"otherUserId": alice.id()}));
        assert_eq!(marked["marked"], 2);
        let marked = h.ok(&bob, "MARK_MESSAGES_READ_REQUEST", json!({"otherUserId": alice.id()}));
        assert_eq!(marked["marked"], 0);

        let convs = h.ok(&bob, "GET_CONVERSATIONS_REQUEST", json!({}));
        assert_eq!(convs["conversations"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn purge_is_admin_only() {
        let h = harness();
        let admin = h.login_as("root@x.com", Role::Admin);
        let alice = h.login_as("alice@x.com", Role::Student);
        let bob = h.login_as("bob@x.com", Role::Student);
        let _ = h.ok(&alice, "SEND_MESSAGE_REQUEST", json!({"recipientId": bob.id(), "content": "x"}));

        let req = json!({"userId": alice.id(), "otherUserId": bob.id()});
        let env = h.send(&alice, "PURGE_CONVERSATION_REQUEST", req.clone());
        assert_eq!(env.message_type, "ERROR_RESPONSE");
        assert_eq!(h.ok(&admin, "PURGE_CONVERSATION_REQUEST", req)["purged"], 1);
    }

    #[test]
    fn validation_errors_use_handler_response_type() {
        let h = harness();
        let alice = h.login_as("alice@x.com", Role::Student);
        let env = h.send(&alice, "SEND_MESSAGE_REQUEST", json!({"recipientId": alice.id(), "content": "me"}));
        assert_eq!(env.message_type, "SEND_MESSAGE_RESPONSE");
        assert_eq!(env.payload.code.as_deref(), Some("VALIDATION_ERROR"));
        assert_eq!(
            h.err(&alice, "SEND_MESSAGE_REQUEST", json!({"recipientId": "usr_ghost", "content": "x"})),
            "NOT_FOUND"
        );
    }
}
