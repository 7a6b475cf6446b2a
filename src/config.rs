//! Client configuration

use crate::protocol::RequestOptions;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8080/ws";
pub const DEFAULT_MODEL: &str = "default";
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Reconnection schedule: exponential backoff with a hard attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts before the connection is declared failed
    pub max_attempts: u32,
    /// Delay before attempt 0; doubles per attempt
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (0-based): 1s, 2s, 4s, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

/// Configuration for a conversation client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, fixed for the lifetime of the client
    pub url: String,
    pub model: String,
    pub options: RequestOptions,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            options: RequestOptions::default(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("ASK_WS_URL") {
            config.url = url;
        }
        if let Some(model) = lookup("ASK_MODEL") {
            config.model = model;
        }
        if let Some(agent_id) = lookup("ASK_AGENT_ID") {
            config.options.agent_id = agent_id;
        }
        if let Some(raw) = lookup("ASK_SEARCH_AVAILABLE") {
            config.options.search_available = parse_bool("ASK_SEARCH_AVAILABLE", &raw)?;
        }
        if let Some(raw) = lookup("ASK_IMAGE_AVAILABLE") {
            config.options.image_available = parse_bool("ASK_IMAGE_AVAILABLE", &raw)?;
        }
        if let Some(user_id) = lookup("ASK_USER_ID") {
            config.options.context.insert("userId".to_string(), user_id.into());
        }
        if let Some(raw) = lookup("ASK_MAX_RECONNECT_ATTEMPTS") {
            config.reconnect.max_attempts = raw
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidValue {
                    name: "ASK_MAX_RECONNECT_ATTEMPTS",
                    value: raw,
                })?;
        }
        if let Some(raw) = lookup("ASK_CONNECT_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "ASK_CONNECT_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
            config.connect_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
        }),
    }
}
