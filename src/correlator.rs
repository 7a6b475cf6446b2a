//! Request identifiers and in-flight request bookkeeping

use crate::protocol::TextRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier correlating an outbound request with its response frames
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A request that was sent but has not seen its terminal frame
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub sent_at: DateTime<Utc>,
    pub payload: TextRequest,
}

/// Issues request ids and tracks the requests awaiting completion.
///
/// There is no timeout: a request whose `stream_complete` never arrives stays
/// pending until it is resolved or the client is torn down.
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    next_sequence: u64,
    pending: HashMap<RequestId, PendingRequest>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh id: wall-clock millis plus a counter that never repeats
    /// for the lifetime of the correlator, so ids stay unique across reconnects
    /// even when the clock stalls.
    pub fn issue(&mut self) -> RequestId {
        self.next_sequence += 1;
        let millis = Utc::now().timestamp_millis();
        RequestId(format!("{millis}-{}", self.next_sequence))
    }

    pub fn track(&mut self, request_id: RequestId, payload: TextRequest) {
        let pending = PendingRequest {
            request_id: request_id.clone(),
            sent_at: Utc::now(),
            payload,
        };
        if self.pending.insert(request_id, pending).is_some() {
            tracing::warn!("Request id tracked twice, replacing earlier entry");
        }
    }

    /// Resolve a request. Unknown or already-resolved ids are a no-op.
    pub fn resolve(&mut self, request_id: &RequestId) -> Option<PendingRequest> {
        let resolved = self.pending.remove(request_id);
        if let Some(req) = &resolved {
            let elapsed_ms = (Utc::now() - req.sent_at).num_milliseconds();
            tracing::debug!(request_id = %request_id, elapsed_ms, "Request resolved");
        }
        resolved
    }

    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        self.pending.contains_key(request_id)
    }

    /// Pending requests ordered by send time
    pub fn pending(&self) -> Vec<PendingRequest> {
        let mut pending: Vec<_> = self.pending.values().cloned().collect();
        pending.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then(a.request_id.cmp(&b.request_id)));
        pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending request, returning how many were abandoned
    pub fn abandon_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }
}
