use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::SessionState;

/// Statistics about a live session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Current lifecycle state
    pub state: SessionState,

    /// When the current (or last) session started
    pub started_at: Option<DateTime<Utc>>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Capture frames sent to the agent
    pub frames_sent: u64,

    /// Capture frames dropped because they were captured before the handshake
    pub frames_dropped_before_open: u64,

    /// Capture frames dropped because the outbound channel was full
    pub frames_dropped_backpressure: u64,

    /// Synthesized chunks scheduled for playback
    pub chunks_scheduled: u64,

    /// Chunks currently queued or playing
    pub chunks_live: usize,

    /// Inbound audio chunks dropped as malformed
    pub decode_errors: u64,

    /// Inbound content messages handled
    pub messages_received: u64,

    /// Messages in the running transcript
    pub transcript_messages: usize,

    /// Archive entry written by the last teardown, if any
    pub archived_entry: Option<String>,
}
