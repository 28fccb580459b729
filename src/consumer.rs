use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::store::PopConnection;
use crate::types::QueueKey;

/// Errors raised by application-supplied handler logic. Contained by the
/// consumer loop; they never terminate it.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Application callback invoked with the decoded payload of each job.
///
/// The return value is not used beyond logging. By the time the handler
/// runs the message is already gone from the store, so a failure here
/// means the job is lost, not redelivered; the backend's own processors
/// behave the same way.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, payload: Value) -> Result<(), HandlerError>;
}

/// Adapter turning an async closure into a [`JobHandler`]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure as a [`JobHandler`]
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> JobHandler for HandlerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: Value) -> Result<(), HandlerError> {
        (self.f)(payload).await
    }
}

/// One consumer loop: Blocked-On-Pop -> Dispatching -> Blocked-On-Pop,
/// until the shutdown flag flips.
///
/// Per-message faults (undecodable envelope, wrong worker, handler error)
/// are terminal for that message only; the loop always re-arms. Store
/// errors back off for a second so a dead connection does not spin. The
/// shutdown flag is only checked between pop attempts: cancellation is
/// cooperative and bounded by the pop timeout, never a forced interrupt.
pub(crate) async fn run_loop(
    mut conn: Box<dyn PopConnection>,
    key: QueueKey,
    worker_name: String,
    handler: Arc<dyn JobHandler>,
    pop_timeout: Duration,
    shutdown: watch::Receiver<bool>,
) {
    debug!("Consumer loop for {} blocked on {}", worker_name, key);

    loop {
        if *shutdown.borrow() {
            break;
        }

        match conn.blocking_pop(&key, pop_timeout).await {
            Ok(Some(raw)) => dispatch_message(&worker_name, &raw, handler.as_ref()).await,
            Ok(None) => continue,
            Err(err) => {
                error!("Blocking pop for {} failed: {}", worker_name, err);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    info!("Consumer loop for {} stopped", worker_name);
}

/// Decode one popped envelope and run the handler for it.
///
/// The envelope is already removed from the store when this runs, so a
/// worker-name mismatch drops the message outright; queue keys must stay
/// worker-exclusive in practice.
pub(crate) async fn dispatch_message(worker_name: &str, raw: &str, handler: &dyn JobHandler) {
    let envelope = match codec::decode(raw) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!("Dropping undecodable message for {}: {}", worker_name, err);
            return;
        }
    };

    if envelope.class != worker_name {
        warn!(
            "Dropping job {} addressed to {} from a queue consumed by {}",
            envelope.jid, envelope.class, worker_name
        );
        return;
    }

    let jid = envelope.jid.clone();
    let payload = envelope.args.into_iter().next().unwrap_or(Value::Null);

    match handler.handle(payload).await {
        Ok(()) => debug!("Job {} of type {} completed", jid, worker_name),
        Err(err) => error!("Job {} of type {} failed: {}", jid, worker_name, err),
    }
}
