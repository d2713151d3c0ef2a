pub mod bucket;
pub mod message;

pub use bucket::BucketKey;
pub use message::{ChatMessage, ConversationId};
