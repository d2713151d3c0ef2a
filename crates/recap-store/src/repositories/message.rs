use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::models::{BucketKey, ChatMessage, ConversationId};

/// Per-conversation, insertion-ordered message log.
///
/// Each conversation lives under its own map shard entry, so appends and
/// prunes on different conversations never contend.
#[derive(Debug, Default)]
pub struct MessageStore {
    conversations: DashMap<ConversationId, Vec<ChatMessage>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to its conversation, creating it on first sight
    pub fn append(&self, message: ChatMessage) {
        self.conversations
            .entry(message.conversation_id)
            .or_default()
            .push(message);
    }

    /// Snapshot of the messages whose timestamp satisfies `predicate`
    pub fn query<F>(&self, conversation: ConversationId, predicate: F) -> Vec<ChatMessage>
    where
        F: Fn(DateTime<Utc>) -> bool,
    {
        self.conversations
            .get(&conversation)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| predicate(m.created_at))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Messages created strictly after `after`
    pub fn since(&self, conversation: ConversationId, after: DateTime<Utc>) -> Vec<ChatMessage> {
        self.query(conversation, |ts| ts > after)
    }

    /// Messages in the window `(start, end]`
    pub fn between(
        &self,
        conversation: ConversationId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<ChatMessage> {
        self.query(conversation, |ts| ts > start && ts <= end)
    }

    /// Remove every message with timestamp <= `cutoff`; returns how many went
    pub fn prune(&self, conversation: ConversationId, cutoff: DateTime<Utc>) -> usize {
        let removed = match self.conversations.get_mut(&conversation) {
            Some(mut messages) => {
                let before = messages.len();
                messages.retain(|m| m.created_at > cutoff);
                before - messages.len()
            }
            None => 0,
        };

        // Drop the entry only if nothing was appended in the meantime.
        self.conversations.remove_if(&conversation, |_, messages| messages.is_empty());
        removed
    }

    /// Bucket keys backed by at least one message newer than `after`
    pub fn live_bucket_keys(
        &self,
        conversation: ConversationId,
        after: DateTime<Utc>,
    ) -> HashSet<BucketKey> {
        self.conversations
            .get(&conversation)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| m.created_at > after)
                    .map(|m| BucketKey::from_timestamp(m.created_at))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn conversations(&self) -> Vec<ConversationId> {
        self.conversations.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self, conversation: ConversationId) -> usize {
        self.conversations
            .get(&conversation)
            .map(|messages| messages.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, conversation: ConversationId) -> bool {
        self.len(conversation) == 0
    }
}
