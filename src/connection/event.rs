//! Events that drive the connection state machine

/// Events that trigger connection state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Caller events
    ConnectRequested,
    CloseRequested,

    // Transport events
    Opened,
    OpenFailed {
        reason: String,
    },
    Closed {
        /// Anything other than a clean close by the peer
        abnormal: bool,
        reason: String,
    },

    // Timer events
    RetryTimeout {
        attempt: u32,
    },
}
