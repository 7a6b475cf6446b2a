//! Property-based tests for frame decoding
//!
//! The receive path must survive any input:
//! - Arbitrary bytes never panic the decoder
//! - Chunk text is preserved exactly, whatever characters it contains
//! - Unrecognised frame types are always rejected, never misrouted

use super::codec::{decode, FrameDecodeError};
use super::frame::InboundFrame;
use proptest::prelude::*;
use serde_json::json;

fn arb_known_type() -> impl Strategy<Value = &'static str> {
    prop::sample::select(InboundFrame::TYPE_NAMES.to_vec())
}

proptest! {
    #[test]
    fn decode_never_panics(raw in ".{0,200}") {
        let _ = decode(&raw);
    }

    #[test]
    fn decode_never_panics_on_typed_garbage(
        frame_type in arb_known_type(),
        key in "[a-zA-Z]{1,12}",
        value in ".{0,40}",
    ) {
        let mut object = serde_json::Map::new();
        object.insert(key, json!(value));
        object.insert("type".to_string(), json!(frame_type));
        let _ = decode(&serde_json::Value::Object(object).to_string());
    }

    #[test]
    fn chunk_text_is_preserved(request_id in "[0-9]{1,13}-[0-9]{1,5}", text in "\\PC{0,80}") {
        let raw = json!({ "type": "stream_chunk", "requestId": request_id, "text": text }).to_string();
        match decode(&raw) {
            Ok(InboundFrame::StreamChunk { request_id: id, text: decoded }) => {
                prop_assert_eq!(id.as_str(), request_id.as_str());
                prop_assert_eq!(decoded, text);
            }
            other => prop_assert!(false, "unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn unknown_types_are_rejected(frame_type in "[a-z_]{1,20}") {
        prop_assume!(!InboundFrame::TYPE_NAMES.contains(&frame_type.as_str()));
        let raw = json!({ "type": frame_type, "text": "x" }).to_string();
        let is_unknown_type = matches!(decode(&raw), Err(FrameDecodeError::UnknownType(_)));
        prop_assert!(is_unknown_type);
    }
}
