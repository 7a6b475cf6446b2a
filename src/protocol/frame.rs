//! Typed frames exchanged over the duplex connection

use crate::correlator::RequestId;
use crate::message::{Citation, HistoryEntry};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Citation payload type marking a web-search-sourced answer
pub const WEB_SEARCH_CITATIONS: &str = "web_search";

// ============================================================================
// Inbound
// ============================================================================

/// Frames received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Partial answer text for a request
    StreamChunk {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        text: String,
    },
    /// Terminal answer frame, authoritative over accumulated chunks
    StreamComplete {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        #[serde(rename = "fullResponse")]
        full_response: String,
        #[serde(
            default,
            deserialize_with = "lenient_citations",
            skip_serializing_if = "Option::is_none"
        )]
        citations: Option<CitationPayload>,
    },
    /// Partial explanation text
    ExplanationChunk { text: String },
    /// Terminal explanation frame
    ExplanationComplete {
        #[serde(rename = "fullResponse")]
        full_response: String,
    },
    /// Out-of-band progress notification
    Event(ActionEvent),
}

impl InboundFrame {
    /// Wire name of the frame type, for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            InboundFrame::StreamChunk { .. } => "stream_chunk",
            InboundFrame::StreamComplete { .. } => "stream_complete",
            InboundFrame::ExplanationChunk { .. } => "explanation_chunk",
            InboundFrame::ExplanationComplete { .. } => "explanation_complete",
            InboundFrame::Event(_) => "event",
        }
    }

    pub(crate) const TYPE_NAMES: [&'static str; 5] = [
        "stream_chunk",
        "stream_complete",
        "explanation_chunk",
        "explanation_complete",
        "event",
    ];
}

/// Sources attached to a terminal answer frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sources: Vec<Citation>,
}

impl CitationPayload {
    pub fn web_search(sources: Vec<Citation>) -> Self {
        Self {
            kind: WEB_SEARCH_CITATIONS.to_string(),
            sources,
        }
    }

    pub fn is_web_search(&self) -> bool {
        self.kind == WEB_SEARCH_CITATIONS
    }
}

/// A malformed citation payload must not cost us the terminal frame.
fn lenient_citations<'de, D>(deserializer: D) -> Result<Option<CitationPayload>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value(value) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed citation payload");
                None
            }
        },
    })
}

/// Progress event body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEvent {
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub status: String,
}

/// Recognised event types; anything else is kept as `Unknown`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionEventKind {
    ActionStart,
    ActionComplete,
    Unknown,
}

impl ActionEvent {
    pub fn new(
        event_type: impl Into<String>,
        action: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            action: action.into(),
            status: status.into(),
        }
    }

    pub fn kind(&self) -> ActionEventKind {
        match self.event_type.as_str() {
            "action_start" => ActionEventKind::ActionStart,
            "action_complete" => ActionEventKind::ActionComplete,
            _ => ActionEventKind::Unknown,
        }
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// Frames sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Text {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        data: TextRequest,
    },
}

impl OutboundFrame {
    pub fn text(request_id: RequestId, data: TextRequest) -> Self {
        OutboundFrame::Text { request_id, data }
    }
}

/// Body of a `text` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRequest {
    pub model: String,
    pub text: String,
    pub messages: Vec<HistoryEntry>,
    pub options: RequestOptions,
}

/// Per-request options
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(rename = "agentId", default)]
    pub agent_id: String,
    #[serde(default)]
    pub search_available: bool,
    #[serde(default)]
    pub image_available: bool,
    #[serde(default)]
    pub custom_tools: Vec<Value>,
    /// Caller identity and context fields, sent alongside the fixed options
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

impl RequestOptions {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Self::default()
        }
    }

    pub fn with_search(mut self, available: bool) -> Self {
        self.search_available = available;
        self
    }

    pub fn with_images(mut self, available: bool) -> Self {
        self.image_available = available;
        self
    }

    pub fn with_custom_tool(mut self, tool: Value) -> Self {
        self.custom_tools.push(tool);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}
