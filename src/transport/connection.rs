use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use super::types::{Snowflake, TransportEvent};

/// Errors that can occur during transport operations.
#[derive(Debug)]
pub enum TransportError {
    /// Credential rejected or missing. Not retryable.
    Auth(String),
    /// Network-level failure (timeout, DNS, connection refused). Retryable.
    Network(String),
    /// Platform returned an error response.
    Api { status: u16, message: String },
    /// Failed to parse the platform's response.
    Parse(String),
    /// Operation attempted before `connect` succeeded.
    NotConnected,
    /// The event channel was closed (controller dropped the receiver).
    ChannelClosed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Auth(msg) => write!(f, "authentication failed: {msg}"),
            TransportError::Network(msg) => write!(f, "network error: {msg}"),
            TransportError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            TransportError::Parse(msg) => write!(f, "parse error: {msg}"),
            TransportError::NotConnected => write!(f, "not connected"),
            TransportError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// The chat-platform collaborator.
///
/// `connect` authenticates and pushes `TransportEvent::Ready` followed by
/// inbound traffic into `events`. Every other call is a single round-trip.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the name of the transport.
    fn name(&self) -> &str;

    async fn connect(
        &self,
        token: &str,
        events: Sender<TransportEvent>,
    ) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Follow `channel_id` for inbound messages in place of the previously
    /// watched channel. Direct messages are always followed.
    async fn watch(&self, channel_id: &str) -> Result<(), TransportError>;

    /// Also follow every guild text channel while `enabled`.
    async fn follow_all(&self, enabled: bool) -> Result<(), TransportError>;

    async fn send(&self, channel_id: &str, content: &str) -> Result<Snowflake, TransportError>;

    async fn send_direct(&self, user_id: &str, content: &str) -> Result<Snowflake, TransportError>;

    async fn start_typing(&self, channel_id: &str) -> Result<(), TransportError>;

    async fn stop_typing(&self, channel_id: &str) -> Result<(), TransportError>;

    async fn edit(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), TransportError>;

    async fn delete(&self, channel_id: &str, message_id: &str) -> Result<(), TransportError>;
}
