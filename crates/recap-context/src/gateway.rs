use std::sync::Arc;

use async_trait::async_trait;
use recap_llm::{ChatClient, ChatRequest, Message};

use crate::error::{FailureCause, GenerationError};

/// One call to the text-generation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system_context: String,
    pub user_prompt: String,
    pub max_output_tokens: u32,
    pub model: String,
}

/// Narrow seam in front of the generation service.
///
/// Implementations make a single attempt; retrying is left to callers.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// Gateway backed by a chat completion client
pub struct LlmGateway {
    client: Arc<dyn ChatClient>,
}

impl LlmGateway {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }

    fn build_request(request: GenerationRequest) -> ChatRequest {
        let system = format!(
            "{} Remember that your max token count is {}.",
            request.system_context, request.max_output_tokens
        );
        ChatRequest::new(
            request.model,
            vec![Message::system(system), Message::user(request.user_prompt)],
        )
        .with_max_tokens(request.max_output_tokens)
    }
}

#[async_trait]
impl GenerationGateway for LlmGateway {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let model = request.model.clone();
        let budget = request.max_output_tokens;

        let response = self.client.chat(Self::build_request(request)).await?;

        if response.finish_reason.as_deref() == Some("length") {
            tracing::warn!(%model, budget, "Generation was cut at the token budget");
        }
        if let Some(usage) = &response.usage {
            tracing::debug!(
                %model,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Generation finished"
            );
        }

        match response.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(GenerationError::new(
                FailureCause::MalformedBody,
                "response contained empty text",
            )),
            None => Err(GenerationError::new(
                FailureCause::MalformedBody,
                "response contained no message content",
            )),
        }
    }
}
