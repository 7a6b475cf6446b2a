//! Effects produced by connection transitions

use std::time::Duration;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a new transport link
    OpenTransport,

    /// Close the current link, if any
    CloseTransport,

    /// Fire `RetryTimeout { attempt }` after `delay`
    ScheduleRetry { delay: Duration, attempt: u32 },

    /// Publish the new state to subscribers
    NotifyState,

    /// Surface a non-recoverable failure to the user
    ReportFatal { message: String },

    /// Forget every in-flight request
    AbandonPending,
}

impl Effect {
    pub fn fatal(message: impl Into<String>) -> Self {
        Effect::ReportFatal {
            message: message.into(),
        }
    }
}
