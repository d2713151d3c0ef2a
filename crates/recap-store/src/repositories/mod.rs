pub mod message;
pub mod summary;
pub mod watermark;

pub use message::MessageStore;
pub use summary::SummaryCache;
pub use watermark::WatermarkStore;
