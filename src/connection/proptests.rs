//! Property-based tests for the connection state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::state::ConnectionState;
use super::transition::transition;
use super::{Effect, Event};
use crate::config::ReconnectPolicy;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_policy() -> impl Strategy<Value = ReconnectPolicy> {
    (1u32..8).prop_map(|max_attempts| ReconnectPolicy {
        max_attempts,
        ..ReconnectPolicy::default()
    })
}

fn arb_state() -> impl Strategy<Value = ConnectionState> {
    prop_oneof![
        Just(ConnectionState::Disconnected),
        Just(ConnectionState::Connecting),
        Just(ConnectionState::Connected),
        (0u32..6).prop_map(|attempt| ConnectionState::Reconnecting { attempt }),
        Just(ConnectionState::Failed),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::ConnectRequested),
        Just(Event::CloseRequested),
        Just(Event::Opened),
        "[a-z ]{0,10}".prop_map(|reason| Event::OpenFailed { reason }),
        (any::<bool>(), "[a-z ]{0,10}").prop_map(|(abnormal, reason)| Event::Closed { abnormal, reason }),
        (0u32..6).prop_map(|attempt| Event::RetryTimeout { attempt }),
    ]
}

proptest! {
    /// The transition function is deterministic
    #[test]
    fn transition_is_pure(state in arb_state(), policy in arb_policy(), event in arb_event()) {
        let a = transition(&state, &policy, event.clone());
        let b = transition(&state, &policy, event);
        match (a, b) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.new_state, b.new_state);
                prop_assert_eq!(a.effects, b.effects);
            }
            (Err(_), Err(_)) => {}
            _ => prop_assert!(false, "non-deterministic transition"),
        }
    }

    /// Entering Failed always reports a fatal error, and nothing else does
    #[test]
    fn failed_iff_fatal_reported(state in arb_state(), policy in arb_policy(), event in arb_event()) {
        if let Ok(result) = transition(&state, &policy, event) {
            let reports_fatal = result.effects.iter().any(|e| matches!(e, Effect::ReportFatal { .. }));
            let entered_failed = result.new_state == ConnectionState::Failed && state != ConnectionState::Failed;
            prop_assert_eq!(reports_fatal, entered_failed);
        }
    }

    /// Any scheduled retry matches the new state's attempt and the backoff schedule
    #[test]
    fn scheduled_retries_follow_policy(state in arb_state(), policy in arb_policy(), event in arb_event()) {
        if let Ok(result) = transition(&state, &policy, event) {
            for effect in &result.effects {
                if let Effect::ScheduleRetry { delay, attempt } = effect {
                    prop_assert_eq!(result.new_state, ConnectionState::Reconnecting { attempt: *attempt });
                    prop_assert_eq!(*delay, policy.delay_for(*attempt));
                    prop_assert!(*attempt < policy.max_attempts);
                }
            }
        }
    }

    /// The old transport is always closed before a retry is scheduled
    #[test]
    fn close_precedes_retry(state in arb_state(), policy in arb_policy(), event in arb_event()) {
        if let Ok(result) = transition(&state, &policy, event) {
            let close = result.effects.iter().position(|e| *e == Effect::CloseTransport);
            let retry = result.effects.iter().position(|e| matches!(e, Effect::ScheduleRetry { .. }));
            if let (Some(close), Some(retry)) = (close, retry) {
                prop_assert!(close < retry);
            }
        }
    }

    /// Under any event sequence the number of retries between successful opens
    /// never exceeds the policy budget
    #[test]
    fn retry_budget_is_never_exceeded(
        policy in arb_policy(),
        events in proptest::collection::vec(arb_event(), 0..60),
    ) {
        let mut state = ConnectionState::Disconnected;
        let mut retries_since_open = 0u32;

        for event in events {
            let opened = event == Event::Opened;
            let Ok(result) = transition(&state, &policy, event) else {
                continue;
            };
            if opened || result.new_state == ConnectionState::Connecting {
                retries_since_open = 0;
            }
            retries_since_open += u32::try_from(
                result.effects.iter().filter(|e| matches!(e, Effect::ScheduleRetry { .. })).count(),
            ).unwrap();
            prop_assert!(retries_since_open <= policy.max_attempts);
            state = result.new_state;
        }
    }

    /// Connect is idempotent once a connection exists or is being established
    #[test]
    fn connect_is_idempotent_when_active(attempt in 0u32..6, policy in arb_policy()) {
        for state in [
            ConnectionState::Connected,
            ConnectionState::Connecting,
            ConnectionState::Reconnecting { attempt },
        ] {
            let result = transition(&state, &policy, Event::ConnectRequested).unwrap();
            prop_assert_eq!(result.new_state, state);
            prop_assert!(result.effects.is_empty());
        }
    }
}
