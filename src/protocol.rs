//! Wire protocol for the streaming connection
//!
//! Frames are JSON objects discriminated by a `type` field.

mod codec;
mod frame;

#[cfg(test)]
mod proptests;

pub use codec::{decode, decode_or_drop, encode, FrameDecodeError, FrameEncodeError};
pub use frame::{
    ActionEvent, ActionEventKind, CitationPayload, InboundFrame, OutboundFrame, RequestOptions,
    TextRequest, WEB_SEARCH_CITATIONS,
};
