pub mod envelope;
pub mod ids;
pub mod keys;

pub use envelope::JobEnvelope;
pub use ids::JobId;
pub use keys::{normalize_queue_name, Keyspace, QueueKey, DEFAULT_QUEUE};
