use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{BridgeError, BridgeResult};
use crate::store::{PopConnection, Store};
use crate::types::QueueKey;

/// In-memory store for tests and development.
///
/// Mirrors the shared-store structures one-to-one: FIFO lists for queues,
/// a score-ordered map for the schedule, plain sets for discovery. Clones
/// share state, so several bridges (competing consumers) can sit on one
/// `MemoryStore` the way several processes sit on one store instance.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

struct Shared {
    ready: AtomicBool,
    state: Mutex<State>,
    /// Wakes consumers blocked on an empty list
    wakeup: Notify,
}

#[derive(Default)]
struct State {
    lists: HashMap<String, VecDeque<String>>,
    sorted: HashMap<String, BTreeMap<i64, Vec<String>>>,
    sets: HashMap<String, BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                ready: AtomicBool::new(true),
                state: Mutex::new(State::default()),
                wakeup: Notify::new(),
            }),
        }
    }

    /// Simulate the connection going down or coming back up
    pub fn set_ready(&self, ready: bool) {
        self.shared.ready.store(ready, Ordering::SeqCst);
    }

    /// Number of pending envelopes on a queue list
    pub fn queue_len(&self, key: &str) -> usize {
        self.shared
            .state
            .lock()
            .lists
            .get(key)
            .map_or(0, VecDeque::len)
    }

    /// Pending envelopes on a queue list, oldest first
    pub fn queue_items(&self, key: &str) -> Vec<String> {
        self.shared
            .state
            .lock()
            .lists
            .get(key)
            .map_or_else(Vec::new, |list| list.iter().rev().cloned().collect())
    }

    /// Entries of an ordered set as `(score, member)` pairs, lowest score
    /// first
    pub fn sorted_entries(&self, key: &str) -> Vec<(i64, String)> {
        self.shared
            .state
            .lock()
            .sorted
            .get(key)
            .map_or_else(Vec::new, |entries| {
                entries
                    .iter()
                    .flat_map(|(score, members)| {
                        members.iter().map(move |m| (*score, m.clone()))
                    })
                    .collect()
            })
    }

    fn ensure_ready(&self) -> BridgeResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(BridgeError::StoreNotReady)
        }
    }

    fn try_pop(&self, key: &str) -> Option<String> {
        self.shared
            .state
            .lock()
            .lists
            .get_mut(key)
            .and_then(VecDeque::pop_back)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    async fn push(&self, key: &QueueKey, raw: String) -> BridgeResult<()> {
        self.ensure_ready()?;
        self.shared
            .state
            .lock()
            .lists
            .entry(key.as_str().to_string())
            .or_default()
            .push_front(raw);
        self.shared.wakeup.notify_waiters();
        Ok(())
    }

    async fn schedule(&self, key: &str, score_ms: i64, raw: String) -> BridgeResult<()> {
        self.ensure_ready()?;
        self.shared
            .state
            .lock()
            .sorted
            .entry(key.to_string())
            .or_default()
            .entry(score_ms)
            .or_default()
            .push(raw);
        Ok(())
    }

    async fn register_queue(&self, key: &str, queue_name: &str) -> BridgeResult<()> {
        self.ensure_ready()?;
        self.shared
            .state
            .lock()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(queue_name.to_string());
        Ok(())
    }

    async fn registered_queues(&self, key: &str) -> BridgeResult<Vec<String>> {
        self.ensure_ready()?;
        Ok(self
            .shared
            .state
            .lock()
            .sets
            .get(key)
            .map_or_else(Vec::new, |set| set.iter().cloned().collect()))
    }

    async fn pop_connection(&self) -> BridgeResult<Box<dyn PopConnection>> {
        self.ensure_ready()?;
        Ok(Box::new(MemoryPopConnection {
            store: self.clone(),
        }))
    }
}

struct MemoryPopConnection {
    store: MemoryStore,
}

#[async_trait]
impl PopConnection for MemoryPopConnection {
    async fn blocking_pop(
        &mut self,
        key: &QueueKey,
        timeout: Duration,
    ) -> BridgeResult<Option<String>> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register for wakeups before checking the list, so a push
            // landing between the check and the await still wakes us.
            let notified = self.store.shared.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(raw) = self.store.try_pop(key.as_str()) {
                return Ok(Some(raw));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}
