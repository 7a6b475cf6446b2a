//! Assistant activity indicator
//!
//! Tracks what the assistant appears to be doing between a request and its
//! answer: thinking, running a named action, or nothing.

use crate::protocol::{ActionEvent, ActionEventKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action status that ends an action
const ACTION_COMPLETED: &str = "completed";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityState {
    #[default]
    Idle,
    /// Request sent, no content yet
    Thinking,
    ActionInProgress { action: String },
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityState::Idle => write!(f, "idle"),
            ActivityState::Thinking => write!(f, "thinking"),
            ActivityState::ActionInProgress { action } => write!(f, "{action}"),
        }
    }
}

/// Derives `ActivityState` from request lifecycle and progress events.
/// Every mutator returns whether the state changed.
#[derive(Debug, Default)]
pub struct ActionTracker {
    state: ActivityState,
}

impl ActionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ActivityState {
        &self.state
    }

    /// A request was handed to the transport
    pub fn begin_request(&mut self) -> bool {
        self.set(ActivityState::Thinking)
    }

    /// Answer or explanation content arrived
    pub fn content_arrived(&mut self) -> bool {
        self.set(ActivityState::Idle)
    }

    pub fn apply(&mut self, event: &ActionEvent) -> bool {
        match event.kind() {
            ActionEventKind::ActionStart => self.set(ActivityState::ActionInProgress {
                action: event.action.clone(),
            }),
            ActionEventKind::ActionComplete if event.status == ACTION_COMPLETED => {
                self.set(ActivityState::Idle)
            }
            ActionEventKind::ActionComplete => {
                tracing::debug!(action = %event.action, status = %event.status, "Action ended without completing");
                false
            }
            ActionEventKind::Unknown => {
                tracing::debug!(event_type = %event.event_type, "Ignoring unknown event type");
                false
            }
        }
    }

    /// Back to idle, e.g. when the connection is torn down
    pub fn reset(&mut self) -> bool {
        self.set(ActivityState::Idle)
    }

    fn set(&mut self, state: ActivityState) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        true
    }
}
