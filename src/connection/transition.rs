//! Pure state transition function

use super::{ConnectionState, Effect, Event};
use crate::config::ReconnectPolicy;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConnectionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function.
///
/// Given the same inputs it always produces the same outputs; timers and
/// sockets are driven by the effects it returns.
pub fn transition(
    state: &ConnectionState,
    policy: &ReconnectPolicy,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (*state, event) {
        // ============================================================
        // Connect
        // ============================================================

        // Already connected or a connect is underway: nothing to do
        (
            ConnectionState::Connected
            | ConnectionState::Connecting
            | ConnectionState::Reconnecting { .. },
            Event::ConnectRequested,
        ) => Ok(TransitionResult::new(*state)),

        // Disconnected/Failed + ConnectRequested -> Connecting (manual retry resets the budget)
        (ConnectionState::Disconnected | ConnectionState::Failed, Event::ConnectRequested) => {
            Ok(TransitionResult::new(ConnectionState::Connecting)
                .with_effect(Effect::NotifyState)
                .with_effect(Effect::OpenTransport))
        }

        // Connecting/Reconnecting + Opened -> Connected (attempt counter resets)
        (
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. },
            Event::Opened,
        ) => Ok(TransitionResult::new(ConnectionState::Connected).with_effect(Effect::NotifyState)),

        // Initial open failed -> first retry
        (ConnectionState::Connecting, Event::OpenFailed { reason }) => {
            tracing::warn!(reason = %reason, "Initial connect failed");
            Ok(schedule_retry(policy, 0))
        }

        // ============================================================
        // Connection loss
        // ============================================================

        // Connected + abnormal close -> Reconnecting { 0 }
        (ConnectionState::Connected, Event::Closed { abnormal: true, reason }) => {
            tracing::warn!(reason = %reason, "Connection lost");
            // CloseTransport must precede ScheduleRetry; timers carry the transport generation
            let retry = schedule_retry(policy, 0);
            Ok(TransitionResult::new(retry.new_state)
                .with_effect(Effect::CloseTransport)
                .with_effects(retry.effects))
        }

        // Connected + clean close -> Disconnected, no retry
        (ConnectionState::Connected, Event::Closed { abnormal: false, reason }) => {
            tracing::info!(reason = %reason, "Connection closed by peer");
            Ok(TransitionResult::new(ConnectionState::Disconnected)
                .with_effect(Effect::CloseTransport)
                .with_effect(Effect::NotifyState))
        }

        // ============================================================
        // Reconnect
        // ============================================================

        // Reconnecting + matching timeout -> try again
        (ConnectionState::Reconnecting { attempt }, Event::RetryTimeout { attempt: fired })
            if attempt == fired =>
        {
            tracing::info!(attempt, "Reconnect attempt");
            Ok(TransitionResult::new(*state).with_effect(Effect::OpenTransport))
        }

        // Stale timeout from a superseded schedule
        (_, Event::RetryTimeout { attempt }) => {
            tracing::debug!(attempt, state = %state, "Ignoring stale retry timeout");
            Ok(TransitionResult::new(*state))
        }

        // Reconnecting + failed attempt -> next attempt, or give up
        (ConnectionState::Reconnecting { attempt }, Event::OpenFailed { reason }) => {
            let next = attempt + 1;
            if next < policy.max_attempts {
                tracing::warn!(attempt, reason = %reason, "Reconnect attempt failed");
                Ok(schedule_retry(policy, next))
            } else {
                let message = format!(
                    "Connection lost and {} reconnect attempts failed: {reason}",
                    policy.max_attempts
                );
                tracing::error!(attempts = policy.max_attempts, reason = %reason, "Giving up on reconnect");
                Ok(TransitionResult::new(ConnectionState::Failed)
                    .with_effect(Effect::NotifyState)
                    .with_effect(Effect::fatal(message)))
            }
        }

        // ============================================================
        // Local close
        // ============================================================
        (ConnectionState::Disconnected, Event::CloseRequested) => {
            Ok(TransitionResult::new(ConnectionState::Disconnected)
                .with_effect(Effect::CloseTransport)
                .with_effect(Effect::AbandonPending))
        }

        (_, Event::CloseRequested) => Ok(TransitionResult::new(ConnectionState::Disconnected)
            .with_effects([
                Effect::CloseTransport,
                Effect::AbandonPending,
                Effect::NotifyState,
            ])),

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}

fn schedule_retry(policy: &ReconnectPolicy, attempt: u32) -> TransitionResult {
    TransitionResult::new(ConnectionState::Reconnecting { attempt })
        .with_effect(Effect::NotifyState)
        .with_effect(Effect::ScheduleRetry {
            delay: policy.delay_for(attempt),
            attempt,
        })
}
