//! Frame encoding and decoding
//!
//! Decoding never panics. Callers on the receive path use `decode_or_drop`,
//! which logs and discards anything that is not a well-formed frame so one
//! bad frame cannot take the connection down.

use super::frame::{InboundFrame, OutboundFrame};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameDecodeError {
    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Frame has no type field")]
    MissingType,
    #[error("Unknown frame type: {0}")]
    UnknownType(String),
}

#[derive(Debug, Error)]
#[error("Failed to encode frame: {0}")]
pub struct FrameEncodeError(#[from] serde_json::Error);

pub fn encode(frame: &OutboundFrame) -> Result<String, FrameEncodeError> {
    Ok(serde_json::to_string(frame)?)
}

pub fn decode(raw: &str) -> Result<InboundFrame, FrameDecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    let frame_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(FrameDecodeError::MissingType)?;

    if !InboundFrame::TYPE_NAMES.contains(&frame_type) {
        return Err(FrameDecodeError::UnknownType(frame_type.to_string()));
    }

    Ok(serde_json::from_value(value)?)
}

pub fn decode_or_drop(raw: &str) -> Option<InboundFrame> {
    match decode(raw) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!(error = %e, len = raw.len(), "Dropping inbound frame");
            None
        }
    }
}
