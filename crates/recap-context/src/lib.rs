mod templates;

pub mod error;
pub mod gateway;
pub mod prompts;
pub mod composer;
pub mod responder;

pub use error::{DigestError, FailureCause, GenerationError};
pub use gateway::{GenerationGateway, GenerationRequest, LlmGateway};
pub use prompts::{PromptBook, PromptKind};
pub use composer::{Digest, DigestComposer, DigestSettings};
pub use responder::Responder;
pub use templates::{
    DEFAULT_ANSWER_PROMPT, DEFAULT_MERGE_PROMPT, DEFAULT_PARROT_PROMPT, DEFAULT_RESPECT_PROMPT,
    DEFAULT_SUMMARY_PROMPT, SYSTEM_CONTEXT,
};
