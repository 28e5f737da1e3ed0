//! Error types for live voice sessions

use thiserror::Error;

use crate::session::SessionState;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that end (or prevent) a live session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Connection error: {0}")]
    Transport(String),

    #[error("Connection closed: {}", .0.as_deref().unwrap_or("no reason given"))]
    TransportClosed(Option<String>),

    #[error("A session is already running (state: {0})")]
    AlreadyRunning(SessionState),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session client has shut down")]
    ClientGone,
}

/// Malformed inbound audio. The offending chunk is dropped.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("PCM payload of {len} bytes is not a multiple of the {width}-byte sample width")]
    InvalidLength { len: usize, width: usize },

    #[error("Unsupported audio MIME type: {0}")]
    UnsupportedMime(String),

    #[error("Invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Stopping a playback handle that has already finished
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Playback handle {id} has already ended")]
pub struct PlaybackStopFailure {
    pub id: u64,
}

/// Transcript archive errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Transcript still contains partial message {0}")]
    NotFinalized(u64),

    #[error("Archive entry {0} not found")]
    NotFound(String),

    #[error("Archive IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
