pub mod types;
pub mod traits;
pub mod error;
pub mod config;
pub mod openai;

pub use traits::{ChatClient, ChatRequest, ChatResponse, TokenUsage};

pub use error::{LlmError, Result};
pub use config::{ClientFactory, OpenAIConfig, ProviderConfig};
pub use openai::OpenAIClient;
pub use types::{Message, Role};
