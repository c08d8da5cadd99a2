pub mod dedup;
pub mod documents;
pub mod queue;

// Re-export common types
pub use dedup::{DedupStore, RedisDedup};
pub use documents::{DocumentSink, DocumentStore};
pub use queue::{QueueKeys, RedisQueue, TaskQueue};
