//! Streaming conversation client for the Ask assistant
//!
//! Holds one WebSocket connection to a fixed endpoint, sends questions as
//! correlated `text` frames, and folds the streamed answer, explanation and
//! progress frames into an ordered message list that subscribers receive on
//! every change. Lost connections are retried with exponential backoff until
//! the retry budget runs out.
//!
//! ```no_run
//! use ask_stream::{ClientConfig, ClientEvent, ConversationClient, WebSocketConnector};
//! use tokio::sync::broadcast::error::RecvError;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let connector = WebSocketConnector::new(config.url.clone(), config.connect_timeout);
//! let client = ConversationClient::spawn(config, connector);
//! let mut events = client.subscribe();
//!
//! client.ask("What changed in the last release?")?;
//! loop {
//!     match events.recv().await {
//!         Ok(ClientEvent::Messages(messages)) => println!("{} messages", messages.len()),
//!         Ok(_) => {}
//!         // Snapshots are cumulative; the next one covers what was skipped
//!         Err(RecvError::Lagged(_)) => continue,
//!         Err(RecvError::Closed) => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod aggregator;
pub mod client;
pub mod config;
pub mod connection;
pub mod correlator;
pub mod message;
pub mod protocol;
pub mod transport;

pub use activity::{ActionTracker, ActivityState};
pub use aggregator::{AggregateOutcome, StreamAggregator};
pub use client::{ClientEvent, ClientSnapshot, ConversationClient, DeliveryError};
pub use config::{ClientConfig, ConfigError, ReconnectPolicy};
pub use connection::ConnectionState;
pub use correlator::{PendingRequest, RequestCorrelator, RequestId};
pub use message::{Citation, HistoryEntry, Message, MessageKind, MessageStatus, Role};
pub use protocol::{InboundFrame, OutboundFrame, RequestOptions, TextRequest};
pub use transport::{Connector, Link, LinkEvent, TransportError, TransportErrorKind, WebSocketConnector};
