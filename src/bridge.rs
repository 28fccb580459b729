use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::consumer::{run_loop, JobHandler};
use crate::dispatcher::Dispatcher;
use crate::error::{BridgeError, BridgeResult};
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::store::Store;
use crate::types::{JobId, Keyspace};

/// Configuration for a bridge instance
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Optional namespace prefixed to every store key
    pub namespace: Option<String>,
    /// Bounded wait of each blocking pop; also the upper bound on how long
    /// cancellation takes to be observed
    pub pop_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            pop_timeout: Duration::from_secs(2),
        }
    }
}

impl BridgeConfig {
    /// Set the key namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the blocking-pop timeout
    pub fn with_pop_timeout(mut self, pop_timeout: Duration) -> Self {
        self.pop_timeout = pop_timeout;
        self
    }
}

/// The bridge between collector processes and the backend job processor.
///
/// One `Bridge` per process composition root: it owns the producer-side
/// [`Dispatcher`], the consumer-side subscription registry, and the key
/// derivation both share. Several bridges (in one process or many) may sit
/// on the same store; the store's atomic pops make them competing
/// consumers, each envelope delivered to exactly one of them.
pub struct Bridge<S: Store> {
    store: Arc<S>,
    dispatcher: Dispatcher<S>,
    registry: SubscriptionRegistry,
    config: BridgeConfig,
}

impl<S: Store> Bridge<S> {
    /// Create a bridge with default configuration
    pub fn new(store: S) -> Self {
        Self::with_config(store, BridgeConfig::default())
    }

    /// Create a bridge with custom configuration
    pub fn with_config(store: S, config: BridgeConfig) -> Self {
        let store = Arc::new(store);
        let keyspace = Keyspace::new(config.namespace.clone());
        Self {
            dispatcher: Dispatcher::new(store.clone(), keyspace),
            registry: SubscriptionRegistry::new(),
            store,
            config,
        }
    }

    /// Publish one job for `worker_name`; see [`Dispatcher::enqueue`]
    pub async fn enqueue(&self, worker_name: &str, payload: Value) -> BridgeResult<JobId> {
        self.dispatcher.enqueue(worker_name, payload).await
    }

    /// Publish one job deferred by `delay`; see [`Dispatcher::enqueue_in`]
    pub async fn enqueue_in(
        &self,
        worker_name: &str,
        delay: Duration,
        payload: Value,
    ) -> BridgeResult<JobId> {
        self.dispatcher.enqueue_in(worker_name, delay, payload).await
    }

    /// Start a consumer loop for `worker_name`.
    ///
    /// The loop blocks on the queue key derived from the worker name and
    /// feeds decoded payloads to `handler` one at a time, until
    /// [`Bridge::unsubscribe`] is called for the worker. One loop per
    /// worker name per bridge; a second `listen` for the same name is
    /// rejected because `unsubscribe` could never reach it.
    pub async fn listen<H: JobHandler>(&self, worker_name: &str, handler: H) -> BridgeResult<()> {
        if !self.store.is_ready() {
            return Err(BridgeError::StoreNotReady);
        }
        if self.registry.contains(worker_name) {
            return Err(BridgeError::WorkerAlreadySubscribed(worker_name.to_string()));
        }

        let key = self.dispatcher.keyspace().queue_key(worker_name);
        let conn = self.store.pop_connection().await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_loop(
            conn,
            key,
            worker_name.to_string(),
            Arc::new(handler),
            self.config.pop_timeout,
            shutdown_rx,
        ));

        let subscription = Subscription::new(worker_name.to_string(), shutdown_tx, task);
        if let Err(subscription) = self.registry.insert(subscription) {
            // Lost a race with a concurrent listen for the same worker
            subscription.stop().await;
            return Err(BridgeError::WorkerAlreadySubscribed(worker_name.to_string()));
        }

        info!("Listening for {} jobs", worker_name);
        Ok(())
    }

    /// Stop the consumer loop for `worker_name`.
    ///
    /// Cooperative: the loop winds down once its current blocking pop
    /// returns, and an in-flight handler finishes undisturbed. Returns
    /// `false` (and logs a warning) when the worker has no active
    /// subscription; that is a no-op, not an error.
    pub fn unsubscribe(&self, worker_name: &str) -> bool {
        match self.registry.remove(worker_name) {
            Some(subscription) => {
                subscription.signal_shutdown();
                info!("Unsubscribed {}", worker_name);
                true
            }
            None => {
                warn!("Unsubscribe for {} which has no active subscription", worker_name);
                false
            }
        }
    }

    /// Stop every consumer loop and wait for each to wind down
    pub async fn shutdown(&self) {
        for subscription in self.registry.drain() {
            subscription.stop().await;
        }
    }

    /// Worker names with live consumer loops on this bridge
    pub fn subscriptions(&self) -> Vec<String> {
        self.registry.worker_names()
    }

    /// Queue names that have ever received an enqueue, read from the
    /// discovery set. Advisory only; it may momentarily lag the queues
    /// themselves.
    pub async fn known_queues(&self) -> BridgeResult<Vec<String>> {
        self.store
            .registered_queues(&self.dispatcher.keyspace().queues_key())
            .await
    }

    /// Get the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the bridge configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}
