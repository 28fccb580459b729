use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Infrastructure errors for bridge operations
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// The store connection has not been established (or has been closed).
    /// Raised synchronously before any write is attempted; callers own
    /// their reconnect/retry policy.
    #[error("store connection is not ready")]
    StoreNotReady,

    #[error("random source unavailable: {0}")]
    RandomSource(String),

    #[error("failed to decode job envelope: {0}")]
    Decode(String),

    #[error("failed to serialize job envelope: {0}")]
    Serialization(String),

    #[error("store command failed: {0}")]
    Store(String),

    #[error("worker '{0}' already has an active subscription")]
    WorkerAlreadySubscribed(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for BridgeError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(err.to_string())
    }
}
