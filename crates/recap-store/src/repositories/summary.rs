use std::collections::HashMap;

use dashmap::DashMap;

use crate::models::{BucketKey, ConversationId};

#[derive(Debug, Default)]
struct ConversationSummaries {
    buckets: HashMap<BucketKey, String>,
    /// Merged digests keyed by the ordered bucket keys they were built from
    merged: HashMap<Vec<BucketKey>, String>,
}

impl ConversationSummaries {
    fn is_empty(&self) -> bool {
        self.buckets.is_empty() && self.merged.is_empty()
    }
}

/// Memoized bucket summaries, keyed by conversation then bucket.
///
/// Merged multi-bucket digests are kept alongside and dropped as soon as any
/// bucket they cover is pruned.
#[derive(Debug, Default)]
pub struct SummaryCache {
    conversations: DashMap<ConversationId, ConversationSummaries>,
}

impl SummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_get(&self, conversation: ConversationId, key: BucketKey) -> Option<String> {
        self.conversations
            .get(&conversation)
            .and_then(|entries| entries.buckets.get(&key).cloned())
    }

    /// Store a summary, replacing any previous text for the same bucket
    pub fn put(&self, conversation: ConversationId, key: BucketKey, text: impl Into<String>) {
        self.conversations
            .entry(conversation)
            .or_default()
            .buckets
            .insert(key, text.into());
    }

    pub fn try_get_merged(&self, conversation: ConversationId, keys: &[BucketKey]) -> Option<String> {
        self.conversations
            .get(&conversation)
            .and_then(|entries| entries.merged.get(keys).cloned())
    }

    pub fn put_merged(&self, conversation: ConversationId, keys: Vec<BucketKey>, text: impl Into<String>) {
        self.conversations
            .entry(conversation)
            .or_default()
            .merged
            .insert(keys, text.into());
    }

    /// Keep only the bucket entries whose key satisfies `keep`; returns how
    /// many bucket entries went
    pub fn prune_keys<F>(&self, conversation: ConversationId, keep: F) -> usize
    where
        F: Fn(&BucketKey) -> bool,
    {
        let removed = match self.conversations.get_mut(&conversation) {
            Some(mut entries) => {
                let before = entries.buckets.len();
                entries.buckets.retain(|key, _| keep(key));
                entries.merged.retain(|keys, _| keys.iter().all(&keep));
                before - entries.buckets.len()
            }
            None => 0,
        };

        self.conversations.remove_if(&conversation, |_, entries| entries.is_empty());
        removed
    }

    /// Bucket keys with a cached summary, oldest first
    pub fn keys(&self, conversation: ConversationId) -> Vec<BucketKey> {
        let mut keys: Vec<BucketKey> = self
            .conversations
            .get(&conversation)
            .map(|entries| entries.buckets.keys().copied().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn conversations(&self) -> Vec<ConversationId> {
        self.conversations.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self, conversation: ConversationId) -> usize {
        self.conversations
            .get(&conversation)
            .map(|entries| entries.buckets.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, conversation: ConversationId) -> bool {
        self.len(conversation) == 0
    }
}
