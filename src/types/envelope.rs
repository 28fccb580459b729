use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::JobId;
use crate::types::keys::DEFAULT_QUEUE;

/// Job envelope - the unit of work exchanged through the shared store.
///
/// The serialized form is the wire schema the backend job processor reads
/// from the same keys, so the field names here are the agreed JSON names,
/// not this crate's own vocabulary. Unknown inbound fields are ignored on
/// decode; `at` and `expires_in` are carried through unchanged when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Logical job type; doubles as the consumer-side filter
    pub class: String,

    /// 24-character lowercase hex job identifier
    pub jid: JobId,

    /// Normalized queue the envelope was (or will be) pushed to
    #[serde(default = "default_queue_name")]
    pub queue: String,

    /// Exactly one element: the caller-supplied payload
    pub args: Vec<Value>,

    /// Deferred-execution timestamp, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<i64>,

    /// Advisory expiry in seconds; the bridge never enforces it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

fn default_queue_name() -> String {
    DEFAULT_QUEUE.to_string()
}

impl JobEnvelope {
    /// Create an envelope carrying a single payload
    pub fn new(class: impl Into<String>, jid: JobId, queue: impl Into<String>, payload: Value) -> Self {
        Self {
            class: class.into(),
            jid,
            queue: queue.into(),
            args: vec![payload],
            at: None,
            expires_in: None,
        }
    }

    /// Set the deferred-execution timestamp (epoch milliseconds)
    pub fn with_at(mut self, at: Option<i64>) -> Self {
        self.at = at;
        self
    }

    /// Set the advisory expiry
    pub fn with_expires_in(mut self, expires_in: Option<i64>) -> Self {
        self.expires_in = expires_in;
        self
    }

    /// The caller-supplied payload, if the envelope carries one
    pub fn payload(&self) -> Option<&Value> {
        self.args.first()
    }

    /// Whether the envelope belongs on the delayed schedule rather than a
    /// live queue
    pub fn is_scheduled(&self) -> bool {
        self.at.is_some()
    }
}
