use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace prefix applied to every queue list key
pub const QUEUE_PREFIX: &str = "queue:";

/// Ordered set of deferred jobs, score = epoch milliseconds
pub const SCHEDULE_KEY: &str = "schedule";

/// Discovery set of every queue name that has received an enqueue
pub const QUEUES_KEY: &str = "queues";

/// Queue used when the caller does not name one
pub const DEFAULT_QUEUE: &str = "default";

/// Normalize a human-meaningful queue or worker name to its canonical
/// lowercase, snake-separated form: `"ValidatorRewards"` becomes
/// `"validator_rewards"`, `"validator rewards"` becomes the same.
///
/// Empty (or all-separator) input falls back to [`DEFAULT_QUEUE`].
/// Normalization is pure: equal inputs always yield equal outputs, and
/// names differing only in case or separators converge on one form.
pub fn normalize_queue_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;

    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            // Break camel-case at a lower/digit -> upper boundary
            if ch.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_numeric()) {
                out.push('_');
            }
            for lc in ch.to_lowercase() {
                out.push(lc);
            }
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
        prev = Some(ch);
    }

    let out = out.trim_matches('_');
    if out.is_empty() {
        DEFAULT_QUEUE.to_string()
    } else {
        out.to_string()
    }
}

/// Fully resolved store key for one queue list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueKey(String);

impl QueueKey {
    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derives the store keys shared with the backend job processor.
///
/// All keys are optionally prefixed by a fixed namespace so several
/// deployments can share one store instance. Resolution is deterministic;
/// the same logical name always lands on the same key.
#[derive(Debug, Clone, Default)]
pub struct Keyspace {
    namespace: Option<String>,
}

impl Keyspace {
    /// Create a keyspace with an optional namespace prefix
    pub fn new(namespace: Option<String>) -> Self {
        Self { namespace }
    }

    /// Resolve the queue list key for a logical queue or worker name
    pub fn queue_key(&self, name: &str) -> QueueKey {
        let normalized = normalize_queue_name(name);
        QueueKey(self.prefixed(&format!("{QUEUE_PREFIX}{normalized}")))
    }

    /// Key of the global delayed-job schedule
    pub fn schedule_key(&self) -> String {
        self.prefixed(SCHEDULE_KEY)
    }

    /// Key of the queue discovery set
    pub fn queues_key(&self) -> String {
        self.prefixed(QUEUES_KEY)
    }

    fn prefixed(&self, key: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{key}"),
            None => key.to_string(),
        }
    }
}
