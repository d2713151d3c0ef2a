// Chat platform seam: inbound messages, replies, polls and role queries

mod telegram;

pub use telegram::{TelegramTransport, TELEGRAM_API_BASE};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recap_store::{ChatMessage, ConversationId};

use crate::error::TransportError;

/// One text message received from the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ConversationId,
    pub message_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub username: Option<String>,
    pub language: Option<String>,
    pub reply_to: Option<i64>,
    pub text: String,
}

impl InboundMessage {
    /// Store record for this message, stamped with its arrival time
    pub fn into_chat_message(self, arrived_at: DateTime<Utc>) -> ChatMessage {
        let mut message = ChatMessage::new(
            self.chat_id,
            self.message_id,
            self.author_id,
            self.author_name,
            self.text,
            arrived_at,
        );
        if let Some(username) = self.username {
            message = message.with_username(username);
        }
        if let Some(language) = self.language {
            message = message.with_language(language);
        }
        if let Some(reply_to) = self.reply_to {
            message = message.with_reply_to(reply_to);
        }
        message
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait for the next batch of inbound messages; may return an empty batch
    async fn next_batch(&self) -> Result<Vec<InboundMessage>, TransportError>;

    async fn send_text(&self, chat: ConversationId, text: &str) -> Result<(), TransportError>;

    async fn send_poll(
        &self,
        chat: ConversationId,
        question: &str,
        options: &[String],
    ) -> Result<(), TransportError>;

    /// Whether `user` administers `chat`
    async fn is_admin(&self, chat: ConversationId, user: i64) -> Result<bool, TransportError>;
}
