use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// Handle to one live consumer loop
#[derive(Debug)]
pub struct Subscription {
    worker_name: String,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(
        worker_name: String,
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            worker_name,
            shutdown,
            task: Some(task),
        }
    }

    /// Worker name this subscription consumes for
    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    /// Flip the shutdown flag. The loop stops re-arming after its current
    /// blocking pop returns; an in-flight handler is allowed to finish.
    pub(crate) fn signal_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal shutdown and wait for the loop task to finish
    pub(crate) async fn stop(mut self) {
        self.signal_shutdown();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("Consumer loop for {} ended abnormally: {}", self.worker_name, err);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // A dropped handle must not leave its loop re-arming forever
        let _ = self.shutdown.send(true);
    }
}

/// Mapping from worker name to its live consumer loop.
///
/// Owned by the [`Bridge`](crate::bridge::Bridge) that starts and stops the
/// loops; one registry per composition root, no process-wide singleton.
/// Entries appear when a listener starts and disappear on unsubscribe.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<HashMap<String, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a worker currently has a live loop
    pub fn contains(&self, worker_name: &str) -> bool {
        self.inner.lock().contains_key(worker_name)
    }

    /// Names of all workers with live loops
    pub fn worker_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Register a subscription; hands it back if the worker already has one
    pub(crate) fn insert(&self, subscription: Subscription) -> Result<(), Subscription> {
        let mut inner = self.inner.lock();
        if inner.contains_key(subscription.worker_name()) {
            return Err(subscription);
        }
        inner.insert(subscription.worker_name().to_string(), subscription);
        Ok(())
    }

    /// Remove a worker's subscription, if any
    pub(crate) fn remove(&self, worker_name: &str) -> Option<Subscription> {
        self.inner.lock().remove(worker_name)
    }

    /// Remove and return every subscription
    pub(crate) fn drain(&self) -> Vec<Subscription> {
        self.inner.lock().drain().map(|(_, sub)| sub).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(worker_name: &str) -> Subscription {
        let (tx, _rx) = watch::channel(false);
        Subscription::new(worker_name.to_string(), tx, tokio::spawn(async {}))
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let registry = SubscriptionRegistry::new();
        registry.insert(subscription("Echo")).unwrap();

        assert!(registry.contains("Echo"));
        assert_eq!(registry.worker_names(), vec!["Echo".to_string()]);

        let removed = registry.remove("Echo").unwrap();
        assert_eq!(removed.worker_name(), "Echo");
        assert!(!registry.contains("Echo"));
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let registry = SubscriptionRegistry::new();
        registry.insert(subscription("Echo")).unwrap();

        let rejected = registry.insert(subscription("Echo"));
        assert!(rejected.is_err());
        // The original entry survives
        assert!(registry.contains("Echo"));
    }

    #[tokio::test]
    async fn test_remove_unknown_worker_is_none() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.remove("Nobody").is_none());
    }

    #[tokio::test]
    async fn test_drain_empties_the_registry() {
        let registry = SubscriptionRegistry::new();
        registry.insert(subscription("A")).unwrap();
        registry.insert(subscription("B")).unwrap();

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.worker_names().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_flag_reaches_the_receiver() {
        let (tx, rx) = watch::channel(false);
        let sub = Subscription::new("Echo".to_string(), tx, tokio::spawn(async {}));

        sub.signal_shutdown();
        assert!(*rx.borrow());
        sub.stop().await;
    }
}
