use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat identifier as assigned by the transport
pub type ConversationId = i64;

/// A single ingested chat message.
///
/// Messages are immutable once stored. The serialized form is what the
/// generation service sees, so absent optional fields are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: i64,
    pub conversation_id: ConversationId,
    pub author_id: i64,
    pub author_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub text: String,
}

impl ChatMessage {
    pub fn new(
        conversation_id: ConversationId,
        message_id: i64,
        author_id: i64,
        author_name: impl Into<String>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id,
            conversation_id,
            author_id,
            author_name: author_name.into(),
            username: None,
            language: None,
            reply_to_message_id: None,
            created_at,
            text: text.into(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_reply_to(mut self, message_id: i64) -> Self {
        self.reply_to_message_id = Some(message_id);
        self
    }
}
