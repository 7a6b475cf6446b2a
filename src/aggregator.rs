//! Folds streamed frames into conversation messages
//!
//! Two independent tracks are maintained. Answer messages are keyed by
//! request id; the explanation track has no id on the wire, so at most one
//! explanation is open at a time. Terminal frames replace whatever the chunks
//! accumulated.

#[cfg(test)]
mod proptests;

use crate::correlator::RequestId;
use crate::message::{HistoryEntry, Message, MessageKind, MessageStatus};
use crate::protocol::{CitationPayload, InboundFrame};
use std::collections::HashMap;

/// What applying one frame did to the message list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateOutcome {
    /// The message list differs from before
    pub changed: bool,
    /// Answer or explanation text arrived (clears the thinking indicator)
    pub content_arrived: bool,
    /// Request whose terminal frame this was
    pub resolved: Option<RequestId>,
}

impl AggregateOutcome {
    fn unchanged() -> Self {
        Self::default()
    }

    fn content() -> Self {
        Self {
            changed: true,
            content_arrived: true,
            resolved: None,
        }
    }

    fn resolving(mut self, request_id: RequestId) -> Self {
        self.resolved = Some(request_id);
        self
    }
}

/// Ordered message list plus the indexes needed to grow it from frames
#[derive(Debug, Default)]
pub struct StreamAggregator {
    messages: Vec<Message>,
    /// Answer message per request, kept after completion so late frames are ignored
    answers: HashMap<RequestId, usize>,
    /// Currently streaming explanation, if any
    open_explanation: Option<usize>,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages still receiving chunks
    pub fn open_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_streaming()).count()
    }

    /// Record a user message that was handed to the transport
    pub fn push_user(&mut self, text: impl Into<String>, request_id: RequestId) {
        self.messages.push(Message::user(text, request_id));
    }

    /// Record a user message that could not be sent
    pub fn push_undelivered(&mut self, text: impl Into<String>) {
        self.messages.push(Message::undelivered(text));
    }

    /// Record a client-side failure notice for a request
    pub fn push_failure(&mut self, text: impl Into<String>, request_id: Option<RequestId>) {
        self.messages.push(Message::failure(text, request_id));
    }

    /// Conversation history to send with the next request: completed user
    /// and answer turns only. Explanations and failed turns stay local.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .filter(|m| m.kind == MessageKind::Answer && m.status == MessageStatus::Complete)
            .map(|m| HistoryEntry::new(m.role, m.content.clone()))
            .collect()
    }

    /// Apply one content frame. Event frames belong to the activity tracker
    /// and leave messages untouched.
    pub fn apply(&mut self, frame: &InboundFrame) -> AggregateOutcome {
        match frame {
            InboundFrame::StreamChunk { request_id, text } => self.answer_chunk(request_id, text),
            InboundFrame::StreamComplete {
                request_id,
                full_response,
                citations,
            } => self.answer_complete(request_id, full_response, citations.as_ref()),
            InboundFrame::ExplanationChunk { text } => self.explanation_chunk(text),
            InboundFrame::ExplanationComplete { full_response } => {
                self.explanation_complete(full_response)
            }
            InboundFrame::Event(_) => AggregateOutcome::unchanged(),
        }
    }

    fn answer_chunk(&mut self, request_id: &RequestId, text: &str) -> AggregateOutcome {
        match self.answers.get(request_id).copied() {
            Some(idx) => {
                let msg = &mut self.messages[idx];
                if !msg.is_streaming() {
                    tracing::debug!(request_id = %request_id, "Chunk after completion, ignoring");
                    return AggregateOutcome::unchanged();
                }
                msg.content.push_str(text);
            }
            None => {
                let idx = self.messages.len();
                self.messages.push(Message::streaming(
                    MessageKind::Answer,
                    text,
                    Some(request_id.clone()),
                ));
                self.answers.insert(request_id.clone(), idx);
            }
        }
        AggregateOutcome::content()
    }

    fn answer_complete(
        &mut self,
        request_id: &RequestId,
        full_response: &str,
        citations: Option<&CitationPayload>,
    ) -> AggregateOutcome {
        let sources = citations
            .filter(|c| c.is_web_search())
            .map(|c| c.sources.clone());

        match self.answers.get(request_id).copied() {
            Some(idx) => {
                let msg = &mut self.messages[idx];
                if !msg.is_streaming() {
                    tracing::debug!(request_id = %request_id, "Duplicate completion, ignoring");
                    return AggregateOutcome::unchanged();
                }
                msg.content = full_response.to_string();
                msg.status = MessageStatus::Complete;
                msg.sources = sources;
            }
            None => {
                // Completion with no chunks: the full response is the message
                let mut msg = Message::completed(
                    MessageKind::Answer,
                    full_response,
                    Some(request_id.clone()),
                );
                msg.sources = sources;
                self.answers.insert(request_id.clone(), self.messages.len());
                self.messages.push(msg);
            }
        }
        AggregateOutcome::content().resolving(request_id.clone())
    }

    fn explanation_chunk(&mut self, text: &str) -> AggregateOutcome {
        match self.open_explanation {
            Some(idx) => self.messages[idx].content.push_str(text),
            None => {
                self.open_explanation = Some(self.messages.len());
                self.messages
                    .push(Message::streaming(MessageKind::Explanation, text, None));
            }
        }
        AggregateOutcome::content()
    }

    fn explanation_complete(&mut self, full_response: &str) -> AggregateOutcome {
        match self.open_explanation.take() {
            Some(idx) => {
                let msg = &mut self.messages[idx];
                msg.content = full_response.to_string();
                msg.status = MessageStatus::Complete;
            }
            None => {
                self.messages.push(Message::completed(
                    MessageKind::Explanation,
                    full_response,
                    None,
                ));
            }
        }
        AggregateOutcome::content()
    }
}
