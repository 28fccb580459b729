//! # fleet-bridge: Shared-store job bridge for collector fleets
//!
//! `fleet-bridge` lets independent data-collection processes hand work to a
//! separately-running backend job processor through a shared key-value
//! store, without either side knowing the other's internals. Producers and
//! consumers speak the backend's fixed wire format for jobs, so collectors
//! written here interoperate with the backend's own queues unchanged.
//!
//! ## Key Features
//!
//! - **Compatible wire format**: JSON envelopes (`class`/`jid`/`queue`/
//!   `args`) on the exact keys the backend job processor reads
//! - **Immediate and delayed publish**: atomic queue push, or a scored
//!   schedule entry the backend promotes when due
//! - **Blocking consumption**: one cooperative task per worker type,
//!   suspended on the store's blocking pop, re-armed indefinitely
//! - **Fault containment**: a malformed envelope or a failing handler is
//!   terminal for that message only, never for the loop
//! - **Storage backends**: Redis for production, an in-memory store for
//!   tests and development
//!
//! ## Quick Start
//!
//! ```rust
//! use fleet_bridge::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> BridgeResult<()> {
//! let bridge = Bridge::new(MemoryStore::new());
//!
//! // Collector side: hand one poll result to the backend.
//! let job_id = bridge
//!     .enqueue(
//!         "ValidatorRewards",
//!         json!({
//!             "queue": "validator_rewards",
//!             "epoch": 312,
//!             "reward_wei": "1032000000000",
//!         }),
//!     )
//!     .await?;
//! assert_eq!(job_id.as_str().len(), 24);
//!
//! // Listener side: consume jobs for the same worker type.
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! bridge
//!     .listen(
//!         "ValidatorRewards",
//!         handler_fn(move |payload| {
//!             let tx = tx.clone();
//!             async move {
//!                 tx.send(payload).ok();
//!                 Ok(())
//!             }
//!         }),
//!     )
//!     .await?;
//!
//! let payload = rx.recv().await.expect("listener delivers the payload");
//! assert_eq!(payload["epoch"], 312);
//!
//! bridge.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Delivery semantics
//!
//! Delivery is at-most-once by design: an envelope leaves the store the
//! instant a consumer pops it, before the handler runs, matching the
//! backend's own job semantics. A crash between pop and handler completion
//! loses that message. Queue keys are assumed worker-exclusive; an
//! envelope popped by the wrong worker type is dropped, not re-queued.

pub mod bridge;
pub mod codec;
pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod store;
pub mod types;

// Core API exports
pub use bridge::{Bridge, BridgeConfig};
pub use consumer::{handler_fn, HandlerError, JobHandler};
pub use dispatcher::Dispatcher;
pub use error::{BridgeError, BridgeResult};
pub use registry::{Subscription, SubscriptionRegistry};
pub use store::{PopConnection, Store};
pub use types::{normalize_queue_name, JobEnvelope, JobId, Keyspace, QueueKey};

// Backend implementations
pub use store::memory::MemoryStore;

#[cfg(feature = "redis")]
pub use store::redis::RedisStore;

/// Everything a collector or listener process needs in scope
pub mod prelude {
    pub use crate::bridge::{Bridge, BridgeConfig};
    pub use crate::consumer::{handler_fn, HandlerError, JobHandler};
    pub use crate::error::{BridgeError, BridgeResult};
    pub use crate::store::memory::MemoryStore;
    pub use crate::store::Store;
    pub use crate::types::{JobEnvelope, JobId};

    #[cfg(feature = "redis")]
    pub use crate::store::redis::RedisStore;

    pub use async_trait::async_trait;
}
