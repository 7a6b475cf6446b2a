//! Conversation client
//!
//! `ConversationClient` is a cheap, cloneable handle. All conversation state
//! (connection, in-flight requests, messages, activity) lives in a single
//! dispatch task that processes commands and transport events one at a time.
//! The handle talks to it over channels and reads the published connection
//! and activity state from `watch` channels, so `send` never suspends.

mod executor;


use crate::activity::ActivityState;
use crate::config::ClientConfig;
use crate::connection::ConnectionState;
use crate::correlator::PendingRequest;
use crate::message::{HistoryEntry, Message};
use crate::protocol::RequestOptions;
use crate::transport::Connector;
use executor::Dispatcher;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

const EVENT_CAPACITY: usize = 256;

/// Events broadcast to subscribers
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Full ordered message list after a mutation
    Messages(Vec<Message>),
    ConnectionChanged(ConnectionState),
    ActivityChanged(ActivityState),
    /// Reconnect budget exhausted; no further automatic attempts
    Fatal { message: String },
}

/// Point-in-time view of the client's state
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    pub messages: Vec<Message>,
    pub pending: Vec<PendingRequest>,
    pub connection: ConnectionState,
    pub activity: ActivityState,
}

/// Why a request could not be handed to the transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Not connected (connection is {state})")]
    NotConnected { state: ConnectionState },
    #[error("Client has been closed")]
    ClientClosed,
}

/// Commands from handles to the dispatch task
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Send {
        text: String,
        /// `None` uses the conversation's own history
        history: Option<Vec<HistoryEntry>>,
        /// `None` uses the configured options
        options: Option<RequestOptions>,
    },
    /// A send that failed fast; keep the attempt visible
    RecordUndelivered { text: String },
    Snapshot { reply: oneshot::Sender<ClientSnapshot> },
    Close,
}

/// Handle to a running conversation
#[derive(Clone)]
pub struct ConversationClient {
    command_tx: mpsc::UnboundedSender<Command>,
    connection: watch::Receiver<ConnectionState>,
    activity: watch::Receiver<ActivityState>,
    events: broadcast::Sender<ClientEvent>,
}

impl ConversationClient {
    /// Start the dispatch task on the current runtime and begin connecting.
    pub fn spawn(config: ClientConfig, connector: impl Connector + 'static) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (connection_tx, connection) = watch::channel(ConnectionState::default());
        let (activity_tx, activity) = watch::channel(ActivityState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let dispatcher = Dispatcher::new(
            config,
            Arc::new(connector),
            command_rx,
            connection_tx,
            activity_tx,
            events.clone(),
        );
        tokio::spawn(dispatcher.run());

        let client = Self {
            command_tx,
            connection,
            activity,
            events,
        };
        let _ = client.connect();
        client
    }

    /// Request a connection. A no-op while connected or connecting; from
    /// `Failed` this starts a fresh retry budget.
    pub fn connect(&self) -> Result<(), DeliveryError> {
        self.command(Command::Connect)
    }

    /// Send a question with an explicit history snapshot and options.
    ///
    /// Returns once the request is queued for the transport; the answer
    /// arrives through `subscribe`. Fails immediately unless connected, in
    /// which case the attempted message is recorded as undelivered and
    /// nothing is written to the transport.
    ///
    /// `Ok` does not mean the frame was written. If the link drops between
    /// this call and the write, the message shows up as undelivered (with an
    /// `Error` notice if the write itself failed) in a later
    /// `ClientEvent::Messages` snapshot.
    pub fn send(
        &self,
        text: impl Into<String>,
        history: Vec<HistoryEntry>,
        options: RequestOptions,
    ) -> Result<(), DeliveryError> {
        self.submit(text.into(), Some(history), Some(options))
    }

    /// Send a question using the conversation's own history and the
    /// configured options.
    pub fn ask(&self, text: impl Into<String>) -> Result<(), DeliveryError> {
        self.submit(text.into(), None, None)
    }

    fn submit(
        &self,
        text: String,
        history: Option<Vec<HistoryEntry>>,
        options: Option<RequestOptions>,
    ) -> Result<(), DeliveryError> {
        let state = *self.connection.borrow();
        if !state.accepts_requests() {
            tracing::warn!(state = %state, "Send rejected, not connected");
            self.command(Command::RecordUndelivered { text })?;
            return Err(DeliveryError::NotConnected { state });
        }
        self.command(Command::Send {
            text,
            history,
            options,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn activity(&self) -> ActivityState {
        self.activity.borrow().clone()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    pub fn watch_activity(&self) -> watch::Receiver<ActivityState> {
        self.activity.clone()
    }

    /// Current messages, pending requests and states. `None` once the client
    /// has stopped.
    pub async fn snapshot(&self) -> Option<ClientSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Snapshot { reply }).ok()?;
        rx.await.ok()
    }

    /// Tear down the transport, abandon pending requests and stop the
    /// dispatch task. Other handles observe `Disconnected`.
    pub fn close(&self) {
        let _ = self.command(Command::Close);
    }

    fn command(&self, command: Command) -> Result<(), DeliveryError> {
        self.command_tx
            .send(command)
            .map_err(|_| DeliveryError::ClientClosed)
    }
}
