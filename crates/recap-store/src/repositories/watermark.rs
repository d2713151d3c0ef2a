use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::models::ConversationId;

/// Time of the last "since last request" digest per conversation
#[derive(Debug, Default)]
pub struct WatermarkStore {
    marks: DashMap<ConversationId, DateTime<Utc>>,
}

impl WatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, conversation: ConversationId) -> Option<DateTime<Utc>> {
        self.marks.get(&conversation).map(|mark| *mark)
    }

    /// Move the watermark forward; an older timestamp never rewinds it
    pub fn advance(&self, conversation: ConversationId, at: DateTime<Utc>) {
        self.marks
            .entry(conversation)
            .and_modify(|mark| {
                if at > *mark {
                    *mark = at;
                }
            })
            .or_insert(at);
    }

    /// Drop the watermark of a conversation that has nothing left to digest
    pub fn forget(&self, conversation: ConversationId) -> bool {
        self.marks.remove(&conversation).is_some()
    }

    pub fn conversations(&self) -> Vec<ConversationId> {
        self.marks.iter().map(|entry| *entry.key()).collect()
    }
}
