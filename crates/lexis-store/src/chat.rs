use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lexis_core::entities::ChatMessage;
use lexis_core::ids::{MessageId, UserId};
use serde::Serialize;

use crate::store::EntityStore;

/// One row of a user's conversation list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub partner_id: UserId,
    pub last_message: ChatMessage,
    pub unread_count: usize,
}

pub trait ChatRepository: Send + Sync {
    /// Store a new message. The timestamp is taken under the chat lock and
    /// never goes backwards, so timestamp order matches insertion order.
    fn append(&self, sender: &UserId, recipient: &UserId, content: String) -> ChatMessage;
    fn find_by_id(&self, id: &MessageId) -> Option<ChatMessage>;

    /// Messages between `a` and `b`, oldest first. With a limit, only the
    /// most recent `limit` are returned (still oldest first).
    fn find_conversation(&self, a: &UserId, b: &UserId, limit: Option<usize>) -> Vec<ChatMessage>;

    /// Mark everything `other` sent to `reader` as read. Returns how many
    /// changed.
    fn mark_conversation_read(&self, reader: &UserId, other: &UserId) -> usize;
    fn unread_count(&self, user: &UserId) -> usize;
    fn unread_by_sender(&self, user: &UserId) -> Vec<(UserId, usize)>;

    /// Partners of `user`, most recent conversation first.
    fn conversations(&self, user: &UserId) -> Vec<ConversationSummary>;
    fn purge_conversation(&self, a: &UserId, b: &UserId) -> usize;
}

pub struct MemoryChatRepo {
    store: EntityStore,
}

impl MemoryChatRepo {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

impl ChatRepository for MemoryChatRepo {
    fn append(&self, sender: &UserId, recipient: &UserId, content: String) -> ChatMessage {
        let clock = self.store.clock();
        self.store.with_chat(|t| {
            let now = clock.now();
            let timestamp: DateTime<Utc> = match t.last_timestamp {
                Some(last) if last > now => last,
                _ => now,
            };
            t.last_timestamp = Some(timestamp);
            let msg = ChatMessage {
                message_id: MessageId::new(),
                sender_id: sender.clone(),
                recipient_id: recipient.clone(),
                content,
                timestamp,
                read: false,
            };
            t.messages.push(msg.clone());
            msg
        })
    }

    fn find_by_id(&self, id: &MessageId) -> Option<ChatMessage> {
        self.store
            .with_chat(|t| t.messages.iter().find(|m| &m.message_id == id).cloned())
    }

    fn find_conversation(&self, a: &UserId, b: &UserId, limit: Option<usize>) -> Vec<ChatMessage> {
        self.store.with_chat(|t| {
            let mut convo: Vec<ChatMessage> = t
                .messages
                .iter()
                .filter(|m| m.is_between(a, b))
                .cloned()
                .collect();
            if let Some(limit) = limit {
                if convo.len() > limit {
                    let _ = convo.drain(..convo.len() - limit);
                }
            }
            convo
        })
    }

    fn mark_conversation_read(&self, reader: &UserId, other: &UserId) -> usize {
        self.store.with_chat(|t| {
            let mut changed = 0;
            for m in t
                .messages
                .iter_mut()
                .filter(|m| &m.recipient_id == reader && &m.sender_id == other && !m.read)
            {
                m.read = true;
                changed += 1;
            }
            changed
        })
    }

    fn unread_count(&self, user: &UserId) -> usize {
        self.store.with_chat(|t| {
            t.messages
                .iter()
                .filter(|m| &m.recipient_id == user && !m.read)
                .count()
        })
    }

    fn unread_by_sender(&self, user: &UserId) -> Vec<(UserId, usize)> {
        let counts = self.store.with_chat(|t| {
            let mut counts: HashMap<UserId, usize> = HashMap::new();
            for m in t.messages.iter().filter(|m| &m.recipient_id == user && !m.read) {
                *counts.entry(m.sender_id.clone()).or_default() += 1;
            }
            counts
        });
        let mut out: Vec<(UserId, usize)> = counts.into_iter().collect();
        out.sort();
        out
    }

    fn conversations(&self, user: &UserId) -> Vec<ConversationSummary> {
        let mut by_partner = self.store.with_chat(|t| {
            let mut by_partner: HashMap<UserId, ConversationSummary> = HashMap::new();
            for m in &t.messages {
                let Some(partner) = m.partner_of(user) else {
                    continue;
                };
                let unread = usize::from(&m.recipient_id == user && !m.read);
                let entry = by_partner
                    .entry(partner.clone())
                    .or_insert_with(|| ConversationSummary {
                        partner_id: partner.clone(),
                        last_message: m.clone(),
                        unread_count: 0,
                    });
                // Later in the vec means later in the conversation.
                entry.last_message = m.clone();
                entry.unread_count += unread;
            }
            by_partner.into_values().collect::<Vec<_>>()
        });
        by_partner.sort_by(|a, b| {
            b.last_message
                .timestamp
                .cmp(&a.last_message.timestamp)
                .then_with(|| b.last_message.message_id.cmp(&a.last_message.message_id))
        });
        by_partner
    }

    fn purge_conversation(&self, a: &UserId, b: &UserId) -> usize {
        self.store.with_chat(|t| {
            let before = t.messages.len();
            t.messages.retain(|m| !m.is_between(a, b));
            before - t.messages.len()
        })
    }
}
