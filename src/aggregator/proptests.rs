//! Property-based tests for stream aggregation

use super::*;
use crate::message::Role;
use proptest::prelude::*;

fn arb_request_id() -> impl Strategy<Value = RequestId> {
    (1u8..4).prop_map(|n| RequestId::from(format!("r{n}")))
}

fn arb_frame() -> impl Strategy<Value = InboundFrame> {
    prop_oneof![
        (arb_request_id(), "[a-z ]{0,6}")
            .prop_map(|(request_id, text)| InboundFrame::StreamChunk { request_id, text }),
        (arb_request_id(), "[a-z ]{0,12}").prop_map(|(request_id, full_response)| {
            InboundFrame::StreamComplete {
                request_id,
                full_response,
                citations: None,
            }
        }),
        "[a-z ]{0,6}".prop_map(|text| InboundFrame::ExplanationChunk { text }),
        "[a-z ]{0,12}".prop_map(|full_response| InboundFrame::ExplanationComplete { full_response }),
    ]
}

proptest! {
    /// At most one answer message exists per request id
    #[test]
    fn one_answer_per_request(frames in proptest::collection::vec(arb_frame(), 0..40)) {
        let mut agg = StreamAggregator::new();
        for frame in &frames {
            agg.apply(frame);
        }
        let mut seen = std::collections::HashSet::new();
        for msg in agg.messages().iter().filter(|m| m.kind == MessageKind::Answer) {
            let id = msg.request_id.clone().unwrap();
            prop_assert!(seen.insert(id), "two answers for one request");
        }
    }

    /// At most one explanation is ever streaming
    #[test]
    fn at_most_one_open_explanation(frames in proptest::collection::vec(arb_frame(), 0..40)) {
        let mut agg = StreamAggregator::new();
        for frame in &frames {
            agg.apply(frame);
            let open = agg
                .messages()
                .iter()
                .filter(|m| m.kind == MessageKind::Explanation && m.is_streaming())
                .count();
            prop_assert!(open <= 1);
        }
    }

    /// A completed answer's content equals the first terminal frame for its request
    #[test]
    fn first_completion_wins(frames in proptest::collection::vec(arb_frame(), 0..40)) {
        let mut agg = StreamAggregator::new();
        let mut first_full: HashMap<RequestId, String> = HashMap::new();
        for frame in &frames {
            if let InboundFrame::StreamComplete { request_id, full_response, .. } = frame {
                let arrived_while_open = agg
                    .messages()
                    .iter()
                    .find(|m| m.request_id.as_ref() == Some(request_id) && m.role == Role::Assistant)
                    .is_none_or(Message::is_streaming);
                if arrived_while_open {
                    first_full.entry(request_id.clone()).or_insert_with(|| full_response.clone());
                }
            }
            agg.apply(frame);
        }
        for msg in agg.messages() {
            if msg.kind == MessageKind::Answer && msg.status == MessageStatus::Complete {
                let id = msg.request_id.as_ref().unwrap();
                prop_assert_eq!(&msg.content, &first_full[id]);
            }
        }
    }

    /// Messages are never removed or reordered
    #[test]
    fn message_list_only_grows(frames in proptest::collection::vec(arb_frame(), 0..40)) {
        let mut agg = StreamAggregator::new();
        let mut ids: Vec<String> = vec![];
        for frame in &frames {
            agg.apply(frame);
            let now: Vec<String> = agg.messages().iter().map(|m| m.id.clone()).collect();
            prop_assert!(now.starts_with(&ids));
            ids = now;
        }
    }

    /// Answer content is the chunks' texts concatenated in arrival order
    #[test]
    fn chunks_concatenate_in_order(chunks in proptest::collection::vec("\\PC{0,8}", 0..30)) {
        let request_id = RequestId::from("r1");
        let mut agg = StreamAggregator::new();
        for text in &chunks {
            agg.apply(&InboundFrame::StreamChunk { request_id: request_id.clone(), text: text.clone() });
        }
        if chunks.is_empty() {
            prop_assert!(agg.messages().is_empty());
        } else {
            prop_assert_eq!(agg.messages().len(), 1);
            prop_assert_eq!(&agg.messages()[0].content, &chunks.concat());
            prop_assert!(agg.messages()[0].is_streaming());
        }
    }

    /// Interleaved explanation chunks never leak into the answer, nor the reverse
    #[test]
    fn tracks_stay_independent(
        chunks in proptest::collection::vec((any::<bool>(), "\\PC{0,8}"), 0..30)
    ) {
        let request_id = RequestId::from("r1");
        let mut agg = StreamAggregator::new();
        let mut answer = String::new();
        let mut explanation = String::new();
        let mut saw_answer = false;
        let mut saw_explanation = false;
        for (is_answer, text) in &chunks {
            if *is_answer {
                saw_answer = true;
                answer.push_str(text);
                agg.apply(&InboundFrame::StreamChunk { request_id: request_id.clone(), text: text.clone() });
            } else {
                saw_explanation = true;
                explanation.push_str(text);
                agg.apply(&InboundFrame::ExplanationChunk { text: text.clone() });
            }
        }

        let answers: Vec<&Message> = agg.messages().iter().filter(|m| m.kind == MessageKind::Answer).collect();
        let explanations: Vec<&Message> = agg.messages().iter().filter(|m| m.kind == MessageKind::Explanation).collect();
        prop_assert_eq!(answers.len(), usize::from(saw_answer));
        prop_assert_eq!(explanations.len(), usize::from(saw_explanation));
        if let Some(msg) = answers.first() {
            prop_assert_eq!(&msg.content, &answer);
        }
        if let Some(msg) = explanations.first() {
            prop_assert_eq!(&msg.content, &explanation);
        }
    }
}
