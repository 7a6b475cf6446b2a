//! Connection state

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the single logical connection owned by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport, no retry scheduled
    #[default]
    Disconnected,

    /// Initial open in flight
    Connecting,

    /// Transport open, frames flowing
    Connected,

    /// Transport lost; `attempt` is the 0-based retry currently scheduled or in flight
    Reconnecting { attempt: u32 },

    /// Retry budget exhausted, no further automatic attempts
    Failed,
}

impl ConnectionState {
    /// Whether `send` may hand frames to the transport
    pub fn accepts_requests(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting { attempt } => write!(f, "reconnecting (attempt {})", attempt + 1),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}
