pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::BridgeResult;
use crate::types::QueueKey;

/// Storage primitives the bridge needs from the shared store.
///
/// The store is shared with the backend job processor, so the operations
/// map one-to-one onto the ordered-list / ordered-set / set structures both
/// sides agree on. Single-key operations are atomic; there is no cross-key
/// transaction, which is why callers must order queue writes before
/// registry writes themselves.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Whether the underlying connection is established and usable.
    /// Producers and consumers check this before issuing any command.
    fn is_ready(&self) -> bool;

    /// Insert a raw envelope at the producing end of a queue list
    async fn push(&self, key: &QueueKey, raw: String) -> BridgeResult<()>;

    /// Insert a raw envelope into an ordered set, scored by epoch
    /// milliseconds
    async fn schedule(&self, key: &str, score_ms: i64, raw: String) -> BridgeResult<()>;

    /// Add a queue name to the discovery set
    async fn register_queue(&self, key: &str, queue_name: &str) -> BridgeResult<()>;

    /// Read the discovery set
    async fn registered_queues(&self, key: &str) -> BridgeResult<Vec<String>>;

    /// Open a dedicated connection for blocking pops.
    ///
    /// A blocking pop occupies its connection for the full wait, so each
    /// consumer loop holds its own; the producing connection is never
    /// reused for pops.
    async fn pop_connection(&self) -> BridgeResult<Box<dyn PopConnection>>;
}

/// A dedicated consumer-side connection
#[async_trait]
pub trait PopConnection: Send {
    /// Atomically remove and return the next envelope from the consuming
    /// end of a queue list, suspending the caller until one is available
    /// or the timeout elapses (`None`).
    async fn blocking_pop(
        &mut self,
        key: &QueueKey,
        timeout: Duration,
    ) -> BridgeResult<Option<String>>;
}
