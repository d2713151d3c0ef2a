use thiserror::Error;

use crate::models::ConversationId;

#[derive(Error, Debug)]
pub enum StoreError {
    /// A retention target could not reach the conversation's state
    #[error("Conversation {0} is unavailable")]
    Unavailable(ConversationId),

    #[error("Invalid retention policy: {0}")]
    InvalidPolicy(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
