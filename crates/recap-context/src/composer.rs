use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use recap_store::{partition, Bucket, BucketKey, ChatMessage, ConversationId, ConversationStore};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::gateway::{GenerationGateway, GenerationRequest};
use crate::prompts::{PromptBook, PromptKind};
use crate::templates::{transcript, DEFAULT_MERGE_PROMPT, SYSTEM_CONTEXT};

/// Token budgets and pacing for digest generation
#[derive(Debug, Clone)]
pub struct DigestSettings {
    /// Budget for one bucket inside a multi-bucket digest
    pub bucket_tokens: u32,
    /// Budget for anything the user reads directly
    pub answer_tokens: u32,
    /// Budget for `/question` answers
    pub question_tokens: u32,
    /// Pause between two uncached bucket generations of one request
    pub call_delay: Duration,
    /// How far back respect/answer/parrot look
    pub context_window: chrono::Duration,
    /// Most recent messages handed to a question answer
    pub question_context_messages: usize,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            bucket_tokens: 200,
            answer_tokens: 500,
            question_tokens: 200,
            call_delay: Duration::from_secs(1),
            context_window: chrono::Duration::hours(24),
            question_context_messages: 50,
        }
    }
}

/// Result of a digest request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Digest {
    /// No message fell into the window
    Empty,
    /// One generation answered the whole window; `bucket` is where it ends
    Single { bucket: BucketKey, text: String },
    /// Several bucket summaries merged into one text
    Merged { buckets: Vec<BucketKey>, text: String },
}

impl Digest {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Single { text, .. } | Self::Merged { text, .. } => Some(text),
        }
    }

    pub fn bucket_count(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Single { .. } => 1,
            Self::Merged { buckets, .. } => buckets.len(),
        }
    }
}

/// Two-stage digest builder over the shared conversation store.
///
/// The map stage summarizes each hour bucket once and memoizes it; the reduce
/// stage merges the bucket summaries of a window into one digest, memoized by
/// the exact bucket set. Map stages of the same conversation run one at a
/// time, so overlapping requests never generate the same bucket twice.
pub struct DigestComposer {
    store: Arc<ConversationStore>,
    gateway: Arc<dyn GenerationGateway>,
    prompts: Arc<PromptBook>,
    settings: DigestSettings,
    gates: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl DigestComposer {
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
            gates: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &DigestSettings {
        &self.settings
    }

    /// Digest of the messages in `(start, end]`
    pub async fn digest_window(
        &self,
        conversation: ConversationId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Digest> {
        let messages = self.store.messages().between(conversation, start, end);
        tracing::debug!(conversation, %start, %end, messages = messages.len(), "Digest window requested");
        self.digest_messages(conversation, messages).await
    }

    /// Digest of the rolling hour `(now - 1h, now]`, answered as one unit.
    ///
    /// The rolling hour usually straddles two buckets. It still gets a single
    /// generation at the answer budget and no reduce stage. That text covers
    /// parts of two buckets, so it is never stored as a bucket summary; a
    /// window inside one bucket goes through the bucket cache as usual.
    pub async fn digest_last_hour(
        &self,
        conversation: ConversationId,
        now: DateTime<Utc>,
    ) -> Result<Digest> {
        let messages = self
            .store
            .messages()
            .between(conversation, now - chrono::Duration::hours(1), now);

        let Some(first) = messages.first() else {
            return Ok(Digest::Empty);
        };
        let first_key = BucketKey::from_timestamp(first.created_at);
        if messages
            .iter()
            .all(|m| BucketKey::from_timestamp(m.created_at) == first_key)
        {
            return self.digest_messages(conversation, messages).await;
        }

        tracing::debug!(conversation, messages = messages.len(), "Rolling hour spans two buckets");
        let text = self.summarize(&messages, self.settings.answer_tokens).await?;
        Ok(Digest::Single {
            bucket: BucketKey::from_timestamp(now),
            text,
        })
    }

    /// Digest of everything since the previous call for this conversation.
    ///
    /// The watermark moves to `now` only when the digest succeeds, so a failed
    /// request can be repeated over the same messages.
    pub async fn digest_since_last_request(
        &self,
        conversation: ConversationId,
        now: DateTime<Utc>,
    ) -> Result<Digest> {
        let since = self
            .store
            .watermarks()
            .get(conversation)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let digest = self.digest_window(conversation, since, now).await?;
        self.store.watermarks().advance(conversation, now);
        Ok(digest)
    }

    async fn digest_messages(
        &self,
        conversation: ConversationId,
        messages: Vec<ChatMessage>,
    ) -> Result<Digest> {
        let buckets = partition(messages);

        match buckets.len() {
            0 => Ok(Digest::Empty),
            1 => {
                let mut summaries = self
                    .summarize_buckets(conversation, &buckets, self.settings.answer_tokens)
                    .await?;
                let (bucket, text) = summaries.remove(0);
                Ok(Digest::Single { bucket, text })
            }
            _ => {
                let summaries = self
                    .summarize_buckets(conversation, &buckets, self.settings.bucket_tokens)
                    .await?;
                let keys: Vec<BucketKey> = summaries.iter().map(|(key, _)| *key).collect();

                let cache = self.store.summaries();
                let text = match cache.try_get_merged(conversation, &keys) {
                    Some(text) => {
                        tracing::debug!(conversation, buckets = keys.len(), "Merged digest cache hit");
                        text
                    }
                    None => {
                        let text = self.merge(&summaries).await?;
                        cache.put_merged(conversation, keys.clone(), text.clone());
                        text
                    }
                };
                Ok(Digest::Merged { buckets: keys, text })
            }
        }
    }

    /// Map stage: cached summary or one generation per bucket, in order
    async fn summarize_buckets(
        &self,
        conversation: ConversationId,
        buckets: &[Bucket],
        budget: u32,
    ) -> Result<Vec<(BucketKey, String)>> {
        let gate = self.gate(conversation);
        let _guard = gate.lock().await;

        let cache = self.store.summaries();
        let mut summaries = Vec::with_capacity(buckets.len());
        let mut generated = 0usize;

        for bucket in buckets {
            if let Some(text) = cache.try_get(conversation, bucket.key) {
                tracing::debug!(conversation, bucket = %bucket.key, "Bucket summary cache hit");
                summaries.push((bucket.key, text));
                continue;
            }

            if generated > 0 {
                tokio::time::sleep(self.settings.call_delay).await;
            }

            tracing::debug!(
                conversation,
                bucket = %bucket.key,
                messages = bucket.messages.len(),
                "Bucket summary cache miss"
            );
            let text = self.summarize(&bucket.messages, budget).await?;
            generated += 1;

            // Another writer may have filled the slot; the first text wins.
            let text = match cache.try_get(conversation, bucket.key) {
                Some(existing) => existing,
                None => {
                    cache.put(conversation, bucket.key, text.clone());
                    text
                }
            };
            summaries.push((bucket.key, text));
        }

        if generated > 0 {
            tracing::info!(
                conversation,
                generated,
                cached = buckets.len() - generated,
                "Bucket summaries ready"
            );
        }
        Ok(summaries)
    }

    async fn summarize(&self, messages: &[ChatMessage], budget: u32) -> Result<String> {
        let instructions = self.prompts.prompt(PromptKind::Summary).await;
        let user_prompt = format!("{}\n\nMessages:\n{}", instructions, transcript(messages));

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

    /// Reduce stage: one call merging every tagged bucket summary
    async fn merge(&self, summaries: &[(BucketKey, String)]) -> Result<String> {
        let sections = summaries
            .iter()
            .map(|(key, text)| format!("[{}]\n{}", key, text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let style = self.prompts.prompt(PromptKind::Summary).await;
        let user_prompt = format!(
            "{}\n{}\n\nSummaries:\n{}",
            DEFAULT_MERGE_PROMPT, style, sections
        );

        tracing::debug!(buckets = summaries.len(), "Merging bucket summaries");
        let text = self
            .gateway
            .generate(GenerationRequest {
                system_context: SYSTEM_CONTEXT.to_string(),
                user_prompt,
                max_output_tokens: self.settings.answer_tokens,
                model: self.prompts.model().await,
            })
            .await?;
        Ok(text)
    }

    fn gate(&self, conversation: ConversationId) -> Arc<Mutex<()>> {
        self.gates.entry(conversation).or_default().clone()
    }

    /// Drop the gates of conversations with no stored messages that no
    /// request is holding; returns how many went
    pub fn release_idle_gates(&self) -> usize {
        let before = self.gates.len();
        // The map holds one reference; a running map stage holds another.
        self.gates.retain(|conversation, gate| {
            Arc::strong_count(gate) > 1 || !self.store.messages().is_empty(*conversation)
        });
        before - self.gates.len()
    }
}
