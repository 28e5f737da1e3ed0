//! Live session management
//!
//! This module provides the `LiveSession` state machine and its actor
//! handle, `LiveClient`. A session:
//! - Captures microphone audio and streams it to the agent once the
//!   handshake completes
//! - Schedules synthesized audio for gapless playback
//! - Reconciles partial transcriptions into finalized turns
//! - Handles barge-in by flushing playback and dropping open partials
//! - Tears down every resource on stop, error, or remote close

mod capture;
mod client;
mod config;
mod session;
mod stats;
mod status;

pub use capture::CaptureGate;
pub use client::{LiveClient, SessionSnapshot};
pub use config::{SessionConfig, DEFAULT_SYSTEM_INSTRUCTION};
pub use session::{LiveSession, SessionEvent};
pub use stats::SessionStats;
pub use status::{SessionState, StatusUpdate};
