pub mod archive;
pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod nats;
pub mod session;
pub mod transcript;
pub mod transport;

pub use archive::{JsonFileArchive, MemoryArchive, TranscriptArchive, TranscriptArchiveEntry};
pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioBuffer, AudioFile, AudioFrame,
    AudioOutput, AudioSource, PlaybackHandle, PlaybackScheduler, TimedOutput,
};
pub use config::Config;
pub use error::{ArchiveError, DecodeError, PlaybackStopFailure, SessionError};
pub use http::{create_router, AppState};
pub use nats::NatsTransport;
pub use session::{
    LiveClient, LiveSession, SessionConfig, SessionSnapshot, SessionState, SessionStats,
    StatusUpdate,
};
pub use transcript::{Speaker, Transcript, TranscriptMessage, TranscriptReconciler, TranscriptUpdate};
pub use transport::{Transport, TransportEvent};
