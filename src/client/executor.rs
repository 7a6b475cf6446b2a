//! Dispatch loop for a conversation client

use super::{ClientEvent, ClientSnapshot, Command};
use crate::activity::{ActionTracker, ActivityState};
use crate::aggregator::StreamAggregator;
use crate::config::ClientConfig;
use crate::connection::{transition, ConnectionState, Effect, Event};
use crate::correlator::RequestCorrelator;
use crate::message::HistoryEntry;
use crate::protocol::{self, InboundFrame, OutboundFrame, RequestOptions, TextRequest};
use crate::transport::{Connector, Link, LinkEvent, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Results of work the loop spawned. `generation` ties each to the transport
/// attempt it belongs to; anything from a superseded attempt is discarded.
#[derive(Debug)]
enum Internal {
    OpenResult {
        generation: u64,
        result: Result<Link, TransportError>,
    },
    RetryTimeout {
        generation: u64,
        attempt: u32,
    },
}

/// Owns every piece of conversation state and processes one input at a time
pub(super) struct Dispatcher {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    state: ConnectionState,
    link: Option<Link>,
    generation: u64,
    correlator: RequestCorrelator,
    aggregator: StreamAggregator,
    activity: ActionTracker,
    command_rx: mpsc::UnboundedReceiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    connection_tx: watch::Sender<ConnectionState>,
    activity_tx: watch::Sender<ActivityState>,
    events_tx: broadcast::Sender<ClientEvent>,
    /// Stops spawned open/retry tasks when the loop exits
    cancel: CancellationToken,
}

impl Dispatcher {
    pub(super) fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        command_rx: mpsc::UnboundedReceiver<Command>,
        connection_tx: watch::Sender<ConnectionState>,
        activity_tx: watch::Sender<ActivityState>,
        events_tx: broadcast::Sender<ClientEvent>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            config,
            connector,
            state: ConnectionState::default(),
            link: None,
            generation: 0,
            correlator: RequestCorrelator::new(),
            aggregator: StreamAggregator::new(),
            activity: ActionTracker::new(),
            command_rx,
            internal_tx,
            internal_rx,
            connection_tx,
            activity_tx,
            events_tx,
            cancel: CancellationToken::new(),
        }
    }

    pub(super) async fn run(mut self) {
        tracing::info!(endpoint = %self.connector.endpoint(), "Starting conversation client");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(Command::Close) => {
                        self.dispatch(Event::CloseRequested);
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    // Every handle dropped
                    None => break,
                },
                Some(internal) = self.internal_rx.recv() => self.handle_internal(internal),
                event = next_link_event(self.link.as_mut()) => self.handle_link_event(event),
            }
        }

        self.cancel.cancel();
        self.link = None;
        tracing::info!(endpoint = %self.connector.endpoint(), "Conversation client stopped");
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.dispatch(Event::ConnectRequested),
            Command::Send {
                text,
                history,
                options,
            } => self.send_request(text, history, options),
            Command::RecordUndelivered { text } => {
                self.aggregator.push_undelivered(text);
                self.emit_messages();
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(ClientSnapshot {
                    messages: self.aggregator.messages().to_vec(),
                    pending: self.correlator.pending(),
                    connection: self.state,
                    activity: self.activity.state().clone(),
                });
            }
            // Handled by the loop so it can exit
            Command::Close => self.dispatch(Event::CloseRequested),
        }
    }

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::OpenResult { generation, result } => {
                if generation != self.generation {
                    tracing::debug!(generation, "Discarding superseded open result");
                    return;
                }
                match result {
                    Ok(link) => {
                        self.link = Some(link);
                        self.dispatch(Event::Opened);
                        if self.state == ConnectionState::Connected {
                            tracing::info!(endpoint = %self.connector.endpoint(), "Connected");
                        } else {
                            self.link = None;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(kind = ?e.kind, error = %e, "Open failed");
                        self.dispatch(Event::OpenFailed {
                            reason: e.to_string(),
                        });
                    }
                }
            }
            Internal::RetryTimeout {
                generation,
                attempt,
            } => {
                if generation == self.generation {
                    self.dispatch(Event::RetryTimeout { attempt });
                }
            }
        }
    }

    fn handle_link_event(&mut self, event: Option<LinkEvent>) {
        match event {
            Some(LinkEvent::Text(raw)) => {
                if let Some(frame) = protocol::decode_or_drop(&raw) {
                    self.handle_frame(&frame);
                }
            }
            Some(LinkEvent::Closed { abnormal, reason }) => {
                self.link = None;
                self.dispatch(Event::Closed { abnormal, reason });
            }
            None => {
                self.link = None;
                self.dispatch(Event::Closed {
                    abnormal: true,
                    reason: "transport dropped".to_string(),
                });
            }
        }
    }

    fn handle_frame(&mut self, frame: &InboundFrame) {
        tracing::trace!(frame_type = frame.type_name(), "Frame received");

        if let InboundFrame::Event(event) = frame {
            if self.activity.apply(event) {
                self.emit_activity();
            }
            return;
        }

        let outcome = self.aggregator.apply(frame);
        if let Some(request_id) = &outcome.resolved {
            if self.correlator.resolve(request_id).is_none() {
                tracing::debug!(request_id = %request_id, "Completion for untracked request");
            }
        }
        if outcome.content_arrived && self.activity.content_arrived() {
            self.emit_activity();
        }
        if outcome.changed {
            self.emit_messages();
        }
    }

    fn send_request(
        &mut self,
        text: String,
        history: Option<Vec<HistoryEntry>>,
        options: Option<RequestOptions>,
    ) {
        let Some(link) = self.link.as_ref().filter(|_| self.state.accepts_requests()) else {
            // Connection dropped after the handle checked it
            tracing::warn!(state = %self.state, "Request not sent, transport gone");
            self.aggregator.push_undelivered(text);
            self.emit_messages();
            return;
        };

        let request_id = self.correlator.issue();
        let payload = TextRequest {
            model: self.config.model.clone(),
            text: text.clone(),
            messages: history.unwrap_or_else(|| self.aggregator.history()),
            options: options.unwrap_or_else(|| self.config.options.clone()),
        };
        let frame = OutboundFrame::text(request_id.clone(), payload.clone());

        let written = protocol::encode(&frame)
            .map_err(|e| e.to_string())
            .and_then(|json| link.send(json));

        match written {
            Ok(()) => {
                tracing::info!(request_id = %request_id, history_len = payload.messages.len(), "Request sent");
                self.correlator.track(request_id.clone(), payload);
                self.aggregator.push_user(text, request_id);
                if self.activity.begin_request() {
                    self.emit_activity();
                }
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Request not sent");
                self.aggregator.push_undelivered(text);
                self.aggregator.push_failure(e, Some(request_id));
            }
        }
        self.emit_messages();
    }

    // ========================================================================
    // Connection state machine
    // ========================================================================

    fn dispatch(&mut self, event: Event) {
        let result = match transition(&self.state, &self.config.reconnect, event) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring connection event");
                return;
            }
        };

        self.state = result.new_state;
        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::OpenTransport => {
                self.generation += 1;
                let generation = self.generation;
                let connector = self.connector.clone();
                let internal_tx = self.internal_tx.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        () = cancel.cancelled() => {}
                        result = connector.open() => {
                            let _ = internal_tx.send(Internal::OpenResult { generation, result });
                        }
                    }
                });
            }

            Effect::CloseTransport => {
                self.generation += 1;
                if self.link.take().is_some() {
                    tracing::debug!("Transport closed");
                }
            }

            Effect::ScheduleRetry { delay, attempt } => {
                tracing::info!(attempt, delay_ms = duration_ms(delay), "Reconnect scheduled");
                let generation = self.generation;
                let internal_tx = self.internal_tx.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        () = cancel.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            let _ = internal_tx.send(Internal::RetryTimeout { generation, attempt });
                        }
                    }
                });
            }

            Effect::NotifyState => {
                tracing::debug!(state = %self.state, "Connection state changed");
                self.connection_tx.send_replace(self.state);
                let _ = self.events_tx.send(ClientEvent::ConnectionChanged(self.state));
            }

            Effect::ReportFatal { message } => {
                let _ = self.events_tx.send(ClientEvent::Fatal { message });
            }

            Effect::AbandonPending => {
                let abandoned = self.correlator.abandon_all();
                if abandoned > 0 {
                    tracing::info!(abandoned, "Abandoned pending requests");
                }
                if self.activity.reset() {
                    self.emit_activity();
                }
            }
        }
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    fn emit_messages(&self) {
        let _ = self
            .events_tx
            .send(ClientEvent::Messages(self.aggregator.messages().to_vec()));
    }

    fn emit_activity(&self) {
        let state = self.activity.state().clone();
        self.activity_tx.send_replace(state.clone());
        let _ = self.events_tx.send(ClientEvent::ActivityChanged(state));
    }
}

/// Next event from the open link; pends forever while there is none
async fn next_link_event(link: Option<&mut Link>) -> Option<LinkEvent> {
    match link {
        Some(link) => link.inbound.recv().await,
        None => std::future::pending().await,
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
