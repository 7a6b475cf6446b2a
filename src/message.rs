//! Conversation message records
//!
//! Messages are built incrementally by the aggregator from streamed frames
//! and handed to subscribers as complete snapshots.

use crate::correlator::RequestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Which track a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// The primary answer track
    Answer,
    /// Side-channel annotation, never merged with answers
    Explanation,
}

/// Lifecycle of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Streaming,
    Complete,
    Error,
}

/// A source reference attached to a web-search answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub status: String,
}

/// One turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub kind: MessageKind,
    pub status: MessageStatus,
    /// Only set on finalized web-search answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Citation>>,
    pub created_at: DateTime<Utc>,
    /// Request that produced (or carried) this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

impl Message {
    fn new(
        role: Role,
        kind: MessageKind,
        status: MessageStatus,
        content: impl Into<String>,
        request_id: Option<RequestId>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            kind,
            status,
            sources: None,
            created_at: Utc::now(),
            request_id,
        }
    }

    /// A user message that was handed to the transport
    pub fn user(content: impl Into<String>, request_id: RequestId) -> Self {
        Self::new(
            Role::User,
            MessageKind::Answer,
            MessageStatus::Complete,
            content,
            Some(request_id),
        )
    }

    /// A user message that never left the client
    pub fn undelivered(content: impl Into<String>) -> Self {
        Self::new(
            Role::User,
            MessageKind::Answer,
            MessageStatus::Error,
            content,
            None,
        )
    }

    /// An assistant message opened by the first chunk of a stream
    pub fn streaming(
        kind: MessageKind,
        content: impl Into<String>,
        request_id: Option<RequestId>,
    ) -> Self {
        Self::new(
            Role::Assistant,
            kind,
            MessageStatus::Streaming,
            content,
            request_id,
        )
    }

    /// An assistant message created directly in its final form
    pub fn completed(
        kind: MessageKind,
        content: impl Into<String>,
        request_id: Option<RequestId>,
    ) -> Self {
        Self::new(
            Role::Assistant,
            kind,
            MessageStatus::Complete,
            content,
            request_id,
        )
    }

    /// An assistant-side failure notice for a request
    pub fn failure(content: impl Into<String>, request_id: Option<RequestId>) -> Self {
        Self::new(
            Role::Assistant,
            MessageKind::Answer,
            MessageStatus::Error,
            content,
            request_id,
        )
    }

    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }
}

/// Role/content pair sent back to the server as conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}
