use std::sync::Arc;

use lexis_core::entities::ChatMessage;
use lexis_core::ids::UserId;
use lexis_core::{LexisError, Result};
use lexis_store::{ChatRepository, ConversationSummary, UserRepository};
use serde::Serialize;
use tracing::debug;

use crate::validate::non_blank;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChatLimits {
    pub max_message_chars: usize,
    /// Upper bound on one history page.
    pub history_limit: usize,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            max_message_chars: 4000,
            history_limit: 200,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderUnread {
    pub sender_id: UserId,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadSummary {
    pub total: usize,
    pub by_sender: Vec<SenderUnread>,
}

pub struct ChatService {
    users: Arc<dyn UserRepository>,
    chat: Arc<dyn ChatRepository>,
    limits: ChatLimits,
}

impl ChatService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        chat: Arc<dyn ChatRepository>,
        limits: ChatLimits,
    ) -> Self {
        Self {
            users,
            chat,
            limits,
        }
    }

    fn require_user(&self, id: &UserId) -> Result<()> {
        if self.users.find_by_id(id).is_none() {
            return Err(LexisError::not_found("Recipient not found"));
        }
        Ok(())
    }

    pub fn send(&self, sender: &UserId, recipient: &UserId, content: &str) -> Result<ChatMessage> {
        if sender == recipient {
            return Err(LexisError::validation("Cannot send a message to yourself"));
        }
        let content = non_blank("content", content)?;
        let chars = content.chars().count();
        if chars > self.limits.max_message_chars {
            return Err(LexisError::validation(format!(
                "Message too long ({chars} > {} characters)",
                self.limits.max_message_chars
            )));
        }
        self.require_user(recipient)?;
        let msg = self.chat.append(sender, recipient, content.to_owned());
        debug!(message_id = %msg.message_id, sender = %sender, recipient = %recipient, "message stored");
        Ok(msg)
    }

    /// Oldest first, at most `limit` (capped by the configured page size).
    pub fn history(
        &self,
        user: &UserId,
        other: &UserId,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>> {
        self.require_user(other)?;
        let limit = limit
            .unwrap_or(self.limits.history_limit)
            .min(self.limits.history_limit);
        Ok(self.chat.find_conversation(user, other, Some(limit)))
    }

    /// Number of messages newly marked read. Zero on a repeat call.
    pub fn mark_read(&self, reader: &UserId, other: &UserId) -> usize {
        self.chat.mark_conversation_read(reader, other)
    }

    pub fn unread(&self, user: &UserId) -> UnreadSummary {
        let by_sender: Vec<SenderUnread> = self
            .chat
            .unread_by_sender(user)
            .into_iter()
            .map(|(sender_id, count)| SenderUnread { sender_id, count })
            .collect();
        UnreadSummary {
            total: by_sender.iter().map(|s| s.count).sum(),
            by_sender,
        }
    }

    pub fn conversations(&self, user: &UserId) -> Vec<ConversationSummary> {
        self.chat.conversations(user)
    }

    pub fn purge(&self, a: &UserId, b: &UserId) -> usize {
        self.chat.purge_conversation(a, b)
    }
}
