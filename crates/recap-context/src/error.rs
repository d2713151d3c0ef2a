use std::fmt;

use recap_llm::LlmError;
use thiserror::Error;

/// Why a generation call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The service could not be reached or the exchange broke off
    Transport,
    /// The service answered with a non-success status
    Status,
    /// The body was unreadable, had no choices, or carried no text
    MalformedBody,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Transport => "transport",
            Self::Status => "status",
            Self::MalformedBody => "malformed body",
        };
        f.write_str(label)
    }
}

/// The one error kind that crosses the generation gateway
#[derive(Error, Debug, Clone)]
#[error("generation failed ({cause}): {detail}")]
pub struct GenerationError {
    pub cause: FailureCause,
    pub detail: String,
}

impl GenerationError {
    pub fn new(cause: FailureCause, detail: impl Into<String>) -> Self {
        Self {
            cause,
            detail: detail.into(),
        }
    }
}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        let cause = match &err {
            LlmError::Transport(_) | LlmError::Config(_) => FailureCause::Transport,
            LlmError::Status { .. } => FailureCause::Status,
            LlmError::MalformedResponse(_) => FailureCause::MalformedBody,
        };
        Self::new(cause, err.to_string())
    }
}

/// Failure of a digest or one-shot request; always safe to ask again later
#[derive(Error, Debug)]
pub enum DigestError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl DigestError {
    pub fn cause(&self) -> FailureCause {
        match self {
            Self::Generation(err) => err.cause,
        }
    }
}

pub type Result<T> = std::result::Result<T, DigestError>;
