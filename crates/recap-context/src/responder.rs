use std::sync::Arc;

use chrono::{DateTime, Utc};
use recap_store::{ChatMessage, ConversationId, ConversationStore};

use crate::composer::DigestSettings;
use crate::error::Result;
use crate::gateway::{GenerationGateway, GenerationRequest};
use crate::prompts::{PromptBook, PromptKind};
use crate::templates::{transcript, SYSTEM_CONTEXT};

/// One-shot generations over recent chat context: respect score, question
/// answers and user imitation. None of these are cached.
pub struct Responder {
    store: Arc<ConversationStore>,
    gateway: Arc<dyn GenerationGateway>,
    prompts: Arc<PromptBook>,
    settings: DigestSettings,
}

impl Responder {
    pub fn new(
        store: Arc<ConversationStore>,
        gateway: Arc<dyn GenerationGateway>,
        prompts: Arc<PromptBook>,
        settings: DigestSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            prompts,
            settings,
        }
    }

    /// Respect level of the conversation over the context window
    pub async fn respect(&self, conversation: ConversationId, now: DateTime<Utc>) -> Result<String> {
        let messages = self.recent(conversation, now);
        let instructions = self.prompts.prompt(PromptKind::Respect).await;
        let prompt = format!("{}\n\nMessages:\n{}", instructions, transcript(&messages));

        self.generate(prompt, self.settings.answer_tokens).await
    }

    /// Answer `question` asked by `asking_user`, with recent messages as context
    pub async fn answer_question(
        &self,
        conversation: ConversationId,
        question: &str,
        asking_user: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let mut messages = self.recent(conversation, now);
        let cap = self.settings.question_context_messages;
        if messages.len() > cap {
            let oldest_kept = messages.len() - cap;
            messages = messages.split_off(oldest_kept);
        }

        let instructions = self.prompts.prompt(PromptKind::Answer).await;
        let prompt = format!(
            "{}\n\nQuestion from {}: {}\n\nMessages:\n{}",
            instructions,
            asking_user,
            question,
            transcript(&messages)
        );

        self.generate(prompt, self.settings.question_tokens).await
    }

    /// A new message written in the manner of `target_user`
    pub async fn parrot(
        &self,
        conversation: ConversationId,
        target_user: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let messages = self.recent(conversation, now);
        let instructions = self.prompts.prompt(PromptKind::Parrot).await;
        let prompt = format!(
            "{}\n\nUser to parrot: {}\n\nMessages:\n{}",
            instructions,
            target_user,
            transcript(&messages)
        );

        self.generate(prompt, self.settings.answer_tokens).await
    }

    fn recent(&self, conversation: ConversationId, now: DateTime<Utc>) -> Vec<ChatMessage> {
        self.store
            .messages()
            .between(conversation, now - self.settings.context_window, now)
    }

    async fn generate(&self, user_prompt: String, budget: u32) -> Result<String> {
        let text = self
            .gateway
            .generate(GenerationRequest {
                system_context: SYSTEM_CONTEXT.to_string(),
                user_prompt,
                max_output_tokens: budget,
                model: self.prompts.model().await,
            })
            .await?;
        Ok(text)
    }
}
