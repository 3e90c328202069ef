//! Resolved timestamp payload encoding.

use serde::Serialize;
use snafu::prelude::*;

use crate::error::{EncodeSnafu, SinkError};
use crate::hlc::Timestamp;

/// Serializes the payload written into resolved timestamp marker files.
pub trait Encoder: Send + Sync {
    /// Encode `ts` for `topic`. The sink passes an empty topic because a
    /// marker covers every topic it writes.
    fn encode_resolved_timestamp(&self, topic: &str, ts: Timestamp) -> Result<Vec<u8>, SinkError>;
}

/// JSON encoder producing `{"resolved":"<wall>.<logical>"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

#[derive(Serialize)]
struct ResolvedPayload {
    resolved: Timestamp,
}

impl Encoder for JsonEncoder {
    fn encode_resolved_timestamp(&self, _topic: &str, ts: Timestamp) -> Result<Vec<u8>, SinkError> {
        serde_json::to_vec(&ResolvedPayload { resolved: ts }).context(EncodeSnafu)
    }
}
