use serde::{Deserialize, Serialize};
use std::fmt;

use crate::transcript::TranscriptUpdate;

/// Lifecycle state of the live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closing,
    Failed,
}

impl SessionState {
    /// Connecting or Active
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Signal published for the UI layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusUpdate {
    /// The session moved to a new lifecycle state
    State { state: SessionState, message: String },
    /// Human-readable activity ("Agent is speaking...", "Ready", ...)
    Activity { message: String },
    /// The running transcript changed
    Transcript { update: TranscriptUpdate },
}
