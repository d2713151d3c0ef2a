use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::ConversationId;
use crate::repositories::{MessageStore, SummaryCache, WatermarkStore};
use crate::retention::{PruneReport, RetentionPolicy, RetentionTarget};

/// All per-conversation state: messages, bucket summaries and watermarks.
///
/// Every component is internally synchronized; callers share the store behind
/// an `Arc` and never hold an outer lock.
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: MessageStore,
    summaries: SummaryCache,
    watermarks: WatermarkStore,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    pub fn summaries(&self) -> &SummaryCache {
        &self.summaries
    }

    pub fn watermarks(&self) -> &WatermarkStore {
        &self.watermarks
    }
}

impl RetentionTarget for ConversationStore {
    fn conversations(&self) -> Vec<ConversationId> {
        let ids: HashSet<ConversationId> = self
            .messages
            .conversations()
            .into_iter()
            .chain(self.summaries.conversations())
            .chain(self.watermarks.conversations())
            .collect();
        let mut ids: Vec<ConversationId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids
    }

    fn prune_conversation(
        &self,
        conversation: ConversationId,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> Result<PruneReport> {
        let messages_removed = self.messages.prune(conversation, policy.message_cutoff(now));

        let live = self
            .messages
            .live_bucket_keys(conversation, policy.summary_cutoff(now));
        let summaries_removed = self
            .summaries
            .prune_keys(conversation, |key| live.contains(key));

        // Nothing left to digest: the next request starts from scratch anyway.
        let forgotten = self.messages.is_empty(conversation)
            && self.summaries.is_empty(conversation)
            && self.watermarks.forget(conversation);

        if messages_removed > 0 || summaries_removed > 0 || forgotten {
            tracing::debug!(
                conversation,
                messages_removed,
                summaries_removed,
                forgotten,
                "Pruned conversation"
            );
        }

        Ok(PruneReport {
            messages_removed,
            summaries_removed,
        })
    }
}
