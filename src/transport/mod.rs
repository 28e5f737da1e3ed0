//! Remote duplex stream abstraction
//!
//! Connecting yields a [`PendingConnection`]: an outbound sender, the inbound
//! event channel, and a handle to close the stream. The stream is not usable
//! for audio until the agent acknowledges the setup with
//! [`TransportEvent::Opened`]; the session drops anything captured earlier.

pub mod messages;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::error::SessionError;

pub use messages::{
    ClientMessage, LiveSetup, ModelTurn, Part, RealtimeInput, ServerContent, ServerMessage,
    SetupComplete, Transcription,
};

/// Capacity of the outbound channel. Sends never wait: a full channel drops.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Event delivered by the remote stream
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake completed
    Opened,
    /// One inbound content message
    Content(ServerContent),
    /// Unrecoverable stream error
    Error(String),
    /// Stream closed by the remote side
    Closed(Option<String>),
}

impl TransportEvent {
    /// Map an inbound wire message to the events it carries
    pub fn from_server_message(message: ServerMessage) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        if message.setup_complete.is_some() {
            events.push(TransportEvent::Opened);
        }
        if let Some(content) = message.server_content {
            events.push(TransportEvent::Content(content));
        }
        events
    }
}

/// Close handle for an open stream
#[async_trait::async_trait]
pub trait Connection: Send {
    async fn close(&mut self) -> Result<()>;
}

/// A stream that has been opened but not yet acknowledged
pub struct PendingConnection {
    pub outbound: mpsc::Sender<ClientMessage>,
    pub events: mpsc::Receiver<TransportEvent>,
    pub connection: Box<dyn Connection>,
}

/// Factory for remote streams
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Open a stream and send `setup` as its first message
    async fn connect(&self, setup: LiveSetup) -> Result<PendingConnection, SessionError>;

    /// Transport name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_complete_maps_to_opened() {
        let message: ServerMessage = serde_json::from_str(r#"{"setupComplete":{}}"#).unwrap();
        assert_eq!(
            TransportEvent::from_server_message(message),
            vec![TransportEvent::Opened]
        );
    }

    #[test]
    fn test_unknown_message_carries_no_events() {
        let message: ServerMessage = serde_json::from_str(r#"{"usageMetadata":{"tokens":3}}"#).unwrap();
        assert!(TransportEvent::from_server_message(message).is_empty());
    }
}
