use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::codec;
use crate::error::{BridgeError, BridgeResult};
use crate::store::Store;
use crate::types::{normalize_queue_name, JobEnvelope, JobId, Keyspace, DEFAULT_QUEUE};

/// Producer side of the bridge.
///
/// Accepts a worker name and an arbitrary JSON payload, wraps them in the
/// shared wire envelope, and publishes atomically to either a live queue
/// or the delayed schedule. The payload may carry `queue`, `at` and
/// `expires_in` routing fields next to its business data; it is echoed
/// into the envelope unchanged either way, so consumers recover exactly
/// what the producer sent.
pub struct Dispatcher<S: Store> {
    store: Arc<S>,
    keyspace: Keyspace,
}

impl<S: Store> Dispatcher<S> {
    /// Create a dispatcher over a shared store
    pub fn new(store: Arc<S>, keyspace: Keyspace) -> Self {
        Self { store, keyspace }
    }

    /// Publish one job for `worker_name`, returning the generated job id.
    ///
    /// With `payload.at` set (epoch milliseconds) the envelope goes to the
    /// delayed schedule and skips the discovery registry; otherwise it is
    /// pushed onto `payload.queue` (default queue when absent) and the
    /// queue name is registered afterwards. The two writes are not atomic
    /// across keys, so the queue is always visible before the registry
    /// advertises it. Nothing is retried internally; every failure
    /// surfaces to the caller.
    pub async fn enqueue(&self, worker_name: &str, payload: Value) -> BridgeResult<JobId> {
        if !self.store.is_ready() {
            return Err(BridgeError::StoreNotReady);
        }

        let job_id = JobId::generate()?;
        let queue_name = payload
            .get("queue")
            .and_then(Value::as_str)
            .map(normalize_queue_name)
            .unwrap_or_else(|| DEFAULT_QUEUE.to_string());
        let at = payload.get("at").and_then(Value::as_i64);
        let expires_in = payload.get("expires_in").and_then(Value::as_i64);

        let envelope = JobEnvelope::new(worker_name, job_id.clone(), queue_name.clone(), payload)
            .with_at(at)
            .with_expires_in(expires_in);
        let raw = codec::encode(&envelope)?;

        match at {
            Some(score_ms) => {
                self.store
                    .schedule(&self.keyspace.schedule_key(), score_ms, raw)
                    .await?;
                debug!(
                    "Scheduled job {} of type {} at {}",
                    job_id, worker_name, score_ms
                );
            }
            None => {
                let key = self.keyspace.queue_key(&queue_name);
                self.store.push(&key, raw).await?;
                self.store
                    .register_queue(&self.keyspace.queues_key(), &queue_name)
                    .await?;
                debug!(
                    "Enqueued job {} of type {} on queue {}",
                    job_id, worker_name, queue_name
                );
            }
        }

        Ok(job_id)
    }

    /// Publish one job deferred by `delay` from now.
    ///
    /// Convenience wrapper that stamps `at` into the payload and routes
    /// through the schedule path; the payload must be a JSON object to
    /// have somewhere to carry the timestamp.
    pub async fn enqueue_in(
        &self,
        worker_name: &str,
        delay: Duration,
        mut payload: Value,
    ) -> BridgeResult<JobId> {
        let at = Utc::now().timestamp_millis() + delay.as_millis() as i64;
        match payload.as_object_mut() {
            Some(object) => {
                object.insert("at".to_string(), Value::from(at));
            }
            None => {
                return Err(BridgeError::Serialization(
                    "deferred payloads must be JSON objects".to_string(),
                ));
            }
        }
        self.enqueue(worker_name, payload).await
    }

    /// Get the keyspace used for key resolution
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }
}
