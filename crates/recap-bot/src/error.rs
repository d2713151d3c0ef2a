use thiserror::Error;

/// Failures talking to the chat platform
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chat API rejected the call: {0}")]
    Api(String),

    #[error("Unexpected chat API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Inbound message stream closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Background task '{0}' stopped without being cancelled")]
    TaskExited(&'static str),

    #[error("Background task '{task}' panicked: {reason}")]
    TaskPanicked { task: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, BotError>;
