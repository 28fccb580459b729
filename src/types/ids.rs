use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BridgeError, BridgeResult};

/// Number of random bytes behind a job identifier. Hex-encoded this yields
/// the 24-character ids the backend job processor expects.
const JOB_ID_BYTES: usize = 12;

/// Unique identifier for a job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Generate a new job id from 12 cryptographically random bytes.
    ///
    /// Collisions are not checked for; the id space makes them negligible.
    /// If the entropy source is unavailable the error propagates; a
    /// non-random id is never substituted.
    pub fn generate() -> BridgeResult<Self> {
        let mut buf = [0u8; JOB_ID_BYTES];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| BridgeError::RandomSource(e.to_string()))?;
        Ok(Self(hex::encode(buf)))
    }

    /// Create a job id from an existing string (e.g. one read back from the store)
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
