use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

use crate::session::{SessionConfig, DEFAULT_SYSTEM_INSTRUCTION};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub agent: AgentConfig,
    pub archive: ArchiveConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub channels: u16,
    #[serde(default = "default_frame_duration_ms")]
    pub frame_duration_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    pub nats_url: String,
    pub voice: String,
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveConfig {
    /// JSON file holding finished transcripts (`~` is expanded)
    pub path: String,
}

fn default_frame_duration_ms() -> u64 {
    100
}

fn default_system_instruction() -> String {
    DEFAULT_SYSTEM_INSTRUCTION.to_string()
}

impl Config {
    /// Load `<path>.{toml,json,...}`, then apply `LIVE_VOICE__SECTION__KEY`
    /// environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("LIVE_VOICE").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            input_sample_rate: self.audio.input_sample_rate,
            output_sample_rate: self.audio.output_sample_rate,
            channels: self.audio.channels,
            frame_duration_ms: self.audio.frame_duration_ms,
            voice: self.agent.voice.clone(),
            system_instruction: self.agent.system_instruction.clone(),
        }
    }

    pub fn archive_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.archive.path).as_ref())
    }
}
