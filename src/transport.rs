//! Duplex transport abstraction
//!
//! A `Link` is a message-passing handle to one open connection: text frames
//! go out through an unbounded sender, and everything the peer does comes
//! back as `LinkEvent`s on a single receiver. Dropping the link closes it.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

const INBOUND_BUFFER: usize = 256;

/// Transport error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Endpoint refused or handshake failed
    Connect,
    /// Open did not finish in time
    Timeout,
}

/// Something the peer did on an open link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Text(String),
    /// The link is gone; no further events follow
    Closed { abnormal: bool, reason: String },
}

/// Handle to one open connection
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::Receiver<LinkEvent>,
}

impl Link {
    /// Hand a frame to the transport. Fails only if the link is already gone.
    pub fn send(&self, text: String) -> Result<(), String> {
        self.outbound
            .send(text)
            .map_err(|_| "link closed".to_string())
    }
}

/// Opens links to a fixed endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<Link, TransportError>;

    /// Endpoint description, for logging
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: Connector + ?Sized> Connector for Arc<T> {
    async fn open(&self) -> Result<Link, TransportError> {
        (**self).open().await
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

// ============================================================================
// WebSocket
// ============================================================================

/// `Connector` over a WebSocket endpoint
pub struct WebSocketConnector {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self) -> Result<Link, TransportError> {
        let (ws_stream, _) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(self.url.as_str()))
                .await
                .map_err(|_| {
                    TransportError::timeout(format!(
                        "connect to {} timed out after {}s",
                        self.url,
                        self.connect_timeout.as_secs()
                    ))
                })?
                .map_err(|e| TransportError::connect(e.to_string()))?;

        tracing::debug!(url = %self.url, "WebSocket open");

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound) = mpsc::channel(INBOUND_BUFFER);

        // Writer: runs until the link handle is dropped or the socket fails
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = ws_write.send(tungstenite::Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            let _ = ws_write.close().await;
        });

        // Reader: forwards text and reports exactly one Closed
        tokio::spawn(async move {
            let closed = loop {
                match ws_read.next().await {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if inbound_tx
                            .send(LinkEvent::Text(text.as_str().to_owned()))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Some(Ok(tungstenite::Message::Binary(bytes))) => {
                        match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => {
                                if inbound_tx.send(LinkEvent::Text(text)).await.is_err() {
                                    return;
                                }
                            }
                            Err(_) => tracing::warn!(len = bytes.len(), "Dropping non-UTF-8 binary frame"),
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => break close_event(frame.as_ref()),
                    // Ping/pong are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        break LinkEvent::Closed {
                            abnormal: true,
                            reason: e.to_string(),
                        }
                    }
                    None => {
                        break LinkEvent::Closed {
                            abnormal: true,
                            reason: "stream ended without close frame".to_string(),
                        }
                    }
                }
            };
            let _ = inbound_tx.send(closed).await;
        });

        Ok(Link { outbound, inbound })
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

fn close_event(frame: Option<&CloseFrame>) -> LinkEvent {
    match frame {
        Some(frame) => LinkEvent::Closed {
            abnormal: frame.code != CloseCode::Normal,
            reason: format!("{} {}", u16::from(frame.code), frame.reason.as_str()),
        },
        // No status code (1005 on the wire): only an explicit 1000 is clean
        None => LinkEvent::Closed {
            abnormal: true,
            reason: "1005 no status code".to_string(),
        },
    }
}
