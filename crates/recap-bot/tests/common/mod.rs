#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use recap_bot::config::{BotConfig, Config, DigestConfig};
use recap_bot::transport::{InboundMessage, Transport};
use recap_bot::{AppState, TransportError};
use recap_context::{FailureCause, GenerationError, GenerationGateway, GenerationRequest};
use recap_store::ConversationId;

pub const ADMIN_CHAT: ConversationId = -1000;
pub const GROUP_CHAT: ConversationId = -2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(ConversationId, String),
    Poll(ConversationId, String, Vec<String>),
}

/// In-memory transport: scripted inbound batches, recorded outbound traffic
#[derive(Default)]
pub struct FakeTransport {
    batches: Mutex<VecDeque<Result<Vec<InboundMessage>, TransportError>>>,
    sent: Mutex<Vec<Sent>>,
    admins: HashSet<(ConversationId, i64)>,
    close_when_drained: bool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closing() -> Self {
        Self {
            close_when_drained: true,
            ..Self::default()
        }
    }

    pub fn with_admin(mut self, chat: ConversationId, user: i64) -> Self {
        self.admins.insert((chat, user));
        self
    }

    pub fn push_batch(&self, batch: Vec<InboundMessage>) {
        self.batches.lock().unwrap().push_back(Ok(batch));
    }

    pub fn push_error(&self, error: TransportError) {
        self.batches.lock().unwrap().push_back(Err(error));
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, chat: ConversationId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text(to, text) if to == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` outbound messages were recorded
    pub async fn wait_for_sent(&self, count: usize) -> Vec<Sent> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if self.sent.lock().unwrap().len() >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for outbound messages");
        self.sent()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn next_batch(&self) -> Result<Vec<InboundMessage>, TransportError> {
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None if self.close_when_drained => Err(TransportError::Closed),
            None => std::future::pending().await,
        }
    }

    async fn send_text(&self, chat: ConversationId, text: &str) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Text(chat, text.to_string()));
        Ok(())
    }

    async fn send_poll(
        &self,
        chat: ConversationId,
        question: &str,
        options: &[String],
    ) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Poll(chat, question.to_string(), options.to_vec()));
        Ok(())
    }

    async fn is_admin(&self, chat: ConversationId, user: i64) -> Result<bool, TransportError> {
        Ok(self.admins.contains(&(chat, user)))
    }
}

/// Gateway answering `generated-N`, or failing while `failing` is set
#[derive(Default)]
pub struct StubGateway {
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
    pub prompts: Mutex<Vec<String>>,
    pub budgets: Mutex<Vec<u32>>,
}

impl StubGateway {
    pub fn failing() -> Self {
        Self {
            failing: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationGateway for StubGateway {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(request.user_prompt);
        self.budgets.lock().unwrap().push(request.max_output_tokens);
        if self.failing.load(Ordering::SeqCst) {
            return Err(GenerationError::new(FailureCause::Status, "stubbed 500"));
        }
        Ok(format!("generated-{}", n))
    }
}

pub fn test_config() -> Config {
    Config {
        bot: BotConfig {
            admin_chat_id: Some(ADMIN_CHAT),
            error_backoff_ms: 10,
            ..BotConfig::default()
        },
        digest: DigestConfig {
            call_delay_ms: 0,
            ..DigestConfig::default()
        },
        ..Config::default()
    }
}

pub fn app(transport: Arc<FakeTransport>, gateway: Arc<StubGateway>) -> Arc<AppState> {
    Arc::new(AppState::new(test_config(), gateway, transport).expect("valid test config"))
}

pub fn inbound(chat: ConversationId, message_id: i64, author_id: i64, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id: chat,
        message_id,
        author_id,
        author_name: format!("user{}", author_id),
        username: None,
        language: Some("uk".to_string()),
        reply_to: None,
        text: text.to_string(),
    }
}
