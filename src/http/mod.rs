//! HTTP API for controlling the live session and browsing the archive
//!
//! - POST /session/start - Start a conversation
//! - POST /session/stop - Stop the conversation and archive its transcript
//! - GET /session/status - Session state, status text and statistics
//! - GET /session/transcript - Running transcript
//! - GET /transcripts - Archived transcripts, newest first
//! - DELETE /transcripts - Clear the archive
//! - DELETE /transcripts/:id - Delete one archived transcript
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
