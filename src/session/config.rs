use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::transport::LiveSetup;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a friendly, concise voice assistant. \
Keep answers short and conversational, and let the user interrupt you at any time.";

/// Configuration for a live session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sample rate of outgoing microphone audio
    pub input_sample_rate: u32,

    /// Sample rate of synthesized audio when the chunk doesn't declare one
    pub output_sample_rate: u32,

    /// Channel count for both directions (only mono is supported)
    pub channels: u16,

    /// Capture frame size in milliseconds
    pub frame_duration_ms: u64,

    /// Synthesized voice identifier
    pub voice: String,

    /// Persona/goal instruction, passed to the agent verbatim
    pub system_instruction: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16000,  // realtime input
            output_sample_rate: 24000, // synthesized speech
            channels: 1,               // Mono
            frame_duration_ms: 100,
            voice: "Puck".to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.channels != 1 {
            return Err(SessionError::Config(format!(
                "only mono audio is supported, got {} channels",
                self.channels
            )));
        }
        if self.input_sample_rate == 0 || self.output_sample_rate == 0 {
            return Err(SessionError::Config("sample rates must be non-zero".to_string()));
        }
        if self.voice.trim().is_empty() {
            return Err(SessionError::Config("a voice must be selected".to_string()));
        }
        Ok(())
    }

    /// Setup message opening the conversation
    pub fn setup(&self) -> LiveSetup {
        LiveSetup {
            voice: self.voice.clone(),
            system_instruction: self.system_instruction.clone(),
            input_sample_rate: self.input_sample_rate,
            output_sample_rate: self.output_sample_rate,
            channels: self.channels,
            response_modalities: vec!["AUDIO".to_string()],
            input_audio_transcription: true,
            output_audio_transcription: true,
        }
    }
}
