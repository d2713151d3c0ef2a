// Telegram Bot API over plain HTTP (long polling)

use std::time::Duration;

use async_trait::async_trait;
use recap_store::ConversationId;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::{InboundMessage, Transport};
use crate::error::TransportError;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Extra time the HTTP client waits beyond the long-poll timeout
const POLL_GRACE: Duration = Duration::from_secs(10);

pub struct TelegramTransport {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
    poll_timeout: Duration,
    /// Next update id to request; every fetched update is acknowledged
    offset: Mutex<i64>,
}

impl TelegramTransport {
    pub fn new(token: impl Into<String>, poll_timeout: Duration) -> Result<Self, TransportError> {
        Self::with_base_url(token, TELEGRAM_API_BASE, poll_timeout)
    }

    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
        poll_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(poll_timeout + POLL_GRACE)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            poll_timeout,
            offset: Mutex::new(0),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, TransportError> {
        let response = self
            .http_client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let envelope: ApiEnvelope<T> = serde_json::from_slice(&bytes).map_err(|e| {
            if status.is_success() {
                TransportError::Decode(e)
            } else {
                TransportError::Api(format!("{} returned {}", method, status))
            }
        })?;

        match (envelope.ok, envelope.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TransportError::Api(format!(
                "{}: {}",
                method,
                envelope.description.unwrap_or_else(|| status.to_string())
            ))),
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn next_batch(&self) -> Result<Vec<InboundMessage>, TransportError> {
        let mut offset = self.offset.lock().await;

        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                json!({
                    "offset": *offset,
                    "timeout": self.poll_timeout.as_secs(),
                    "allowed_updates": ["message"],
                }),
            )
            .await?;

        if let Some(last) = updates.iter().map(|update| update.update_id).max() {
            *offset = last + 1;
        }

        let batch: Vec<InboundMessage> = updates
            .into_iter()
            .filter_map(|update| update.message)
            .filter_map(TgMessage::into_inbound)
            .collect();

        if !batch.is_empty() {
            tracing::debug!(messages = batch.len(), next_offset = *offset, "Received updates");
        }
        Ok(batch)
    }

    async fn send_text(&self, chat: ConversationId, text: &str) -> Result<(), TransportError> {
        let _: Value = self
            .call("sendMessage", json!({ "chat_id": chat, "text": text }))
            .await?;
        Ok(())
    }

    async fn send_poll(
        &self,
        chat: ConversationId,
        question: &str,
        options: &[String],
    ) -> Result<(), TransportError> {
        let options: Vec<Value> = options.iter().map(|text| json!({ "text": text })).collect();
        let _: Value = self
            .call(
                "sendPoll",
                json!({ "chat_id": chat, "question": question, "options": options }),
            )
            .await?;
        Ok(())
    }

    async fn is_admin(&self, chat: ConversationId, user: i64) -> Result<bool, TransportError> {
        let member: ChatMember = self
            .call("getChatMember", json!({ "chat_id": chat, "user_id": user }))
            .await?;
        Ok(matches!(member.status.as_str(), "creator" | "administrator"))
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    chat: TgChat,
    from: Option<TgUser>,
    text: Option<String>,
    reply_to_message: Option<Box<TgMessage>>,
}

impl TgMessage {
    /// Text messages with a known author; everything else is ignored
    fn into_inbound(self) -> Option<InboundMessage> {
        let text = self.text?;
        let from = self.from?;
        let author_name = from
            .first_name
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| from.username.clone())
            .unwrap_or_else(|| from.id.to_string());

        Some(InboundMessage {
            chat_id: self.chat.id,
            message_id: self.message_id,
            author_id: from.id,
            author_name,
            username: from.username,
            language: from.language_code,
            reply_to: self.reply_to_message.map(|reply| reply.message_id),
            text,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    first_name: Option<String>,
    username: Option<String>,
    language_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    status: String,
}
