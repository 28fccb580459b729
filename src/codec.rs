//! Serialize/deserialize the wire format shared with the backend job
//! processor. Both sides of the bridge read the same keys, so the schema
//! here must stay byte-compatible with what the backend expects.

use crate::error::{BridgeError, BridgeResult};
use crate::types::JobEnvelope;

/// Serialize an envelope to its wire form
pub fn encode(envelope: &JobEnvelope) -> BridgeResult<String> {
    serde_json::to_string(envelope).map_err(|e| BridgeError::Serialization(e.to_string()))
}

/// Parse an envelope read back from the store.
///
/// Rejects envelopes whose `args` does not hold exactly one element; the
/// bridge only ever writes single-payload envelopes, so anything else on
/// the key is malformed from its point of view.
pub fn decode(raw: &str) -> BridgeResult<JobEnvelope> {
    let envelope: JobEnvelope =
        serde_json::from_str(raw).map_err(|e| BridgeError::Decode(e.to_string()))?;

    if envelope.args.len() != 1 {
        return Err(BridgeError::Decode(format!(
            "expected exactly one args element, got {}",
            envelope.args.len()
        )));
    }

    Ok(envelope)
}
