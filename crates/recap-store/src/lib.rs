pub mod models;
pub mod partition;
pub mod repositories;
pub mod retention;
pub mod client;
pub mod error;

pub use models::{BucketKey, ChatMessage, ConversationId};
pub use partition::{partition, Bucket};
pub use repositories::{MessageStore, SummaryCache, WatermarkStore};
pub use retention::{PruneReport, RetentionPolicy, RetentionTarget};
pub use client::ConversationStore;
pub use error::{Result, StoreError};
