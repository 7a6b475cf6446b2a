//! ask - terminal client for the Ask assistant
//!
//! Reads questions from stdin, streams answers to stdout. Connection and
//! activity changes go to stderr alongside the JSON logs.

use ask_stream::{
    ActivityState, ClientConfig, ClientEvent, ConversationClient, Message, MessageKind,
    MessageStatus, Role, WebSocketConnector,
};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ask_stream=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env()?;
    tracing::info!(url = %config.url, model = %config.model, "Starting ask");

    let connector = WebSocketConnector::new(config.url.clone(), config.connect_timeout);
    let client = ConversationClient::spawn(config, connector);
    let mut events = client.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printer = Printer::default();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "" => {}
                    "/quit" => break,
                    "/status" => match client.snapshot().await {
                        Some(snapshot) => println!(
                            "connection: {}, pending requests: {}, activity: {}",
                            snapshot.connection,
                            snapshot.pending.len(),
                            snapshot.activity
                        ),
                        None => println!("client stopped"),
                    },
                    question => {
                        if let Err(e) = client.ask(question) {
                            eprintln!("! {e}");
                        }
                    }
                }
            }
            event = events.recv() => match event {
                Ok(ClientEvent::Messages(messages)) => printer.render(&messages)?,
                Ok(ClientEvent::ConnectionChanged(state)) => eprintln!("[{state}]"),
                Ok(ClientEvent::ActivityChanged(activity)) => {
                    if activity != ActivityState::Idle {
                        eprintln!("[{activity}...]");
                    }
                }
                Ok(ClientEvent::Fatal { message }) => {
                    client.close();
                    return Err(message.into());
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    client.close();
    Ok(())
}

/// Prints assistant text incrementally as message snapshots arrive
#[derive(Default)]
struct Printer {
    /// Text already written, per message id
    shown: HashMap<String, String>,
    finished: HashSet<String>,
}

impl Printer {
    fn render(&mut self, messages: &[Message]) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();

        for msg in messages.iter().filter(|m| m.role == Role::Assistant) {
            if self.finished.contains(&msg.id) {
                continue;
            }
            let fresh = !self.shown.contains_key(&msg.id);
            let shown = self.shown.entry(msg.id.clone()).or_default();
            if fresh && msg.kind == MessageKind::Explanation {
                write!(out, "(explanation) ")?;
            }
            match msg.content.strip_prefix(shown.as_str()) {
                Some(delta) => write!(out, "{delta}")?,
                // The terminal frame rewrote the text
                None => write!(out, "\n{}", msg.content)?,
            }
            shown.clone_from(&msg.content);

            if msg.status != MessageStatus::Streaming {
                writeln!(out)?;
                for source in msg.sources.iter().flatten() {
                    writeln!(out, "  - {} <{}>", source.name, source.url)?;
                }
                self.shown.remove(&msg.id);
                self.finished.insert(msg.id.clone());
            }
        }

        out.flush()
    }
}
