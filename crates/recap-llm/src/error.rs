use thiserror::Error;

/// Failures of a single chat completion call.
///
/// The request-level variants (`Transport`, `Status`, `MalformedResponse`) are
/// kept apart so callers can tell a dead network from a rejected request from
/// a response they could not read.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Status {
        status: u16,
        body: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
