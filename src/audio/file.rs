use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::codec::i16_to_sample;
use crate::error::SessionError;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Float samples in [-1, 1], interleaved
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleFormat::Int => reader
                .into_samples::<i16>()
                .map(|s| s.map(i16_to_sample))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
        };

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split into fixed-duration capture frames
    pub fn frames(&self, frame_duration_ms: u64) -> Vec<AudioFrame> {
        let frame_len = ((self.sample_rate as u64 * frame_duration_ms / 1000) as usize).max(1)
            * self.channels.max(1) as usize;

        self.samples
            .chunks(frame_len)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_duration_ms,
                sequence: 0,
            })
            .collect()
    }
}

/// Capture backend that replays a WAV file in real time, one frame per
/// `buffer_duration_ms`, as a microphone would deliver it.
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    file: Option<AudioFile>,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>, config: AudioBackendConfig) -> Self {
        Self {
            path: path.into(),
            config,
            file: None,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, SessionError> {
        if self.is_capturing() {
            return Err(SessionError::DeviceUnavailable(format!(
                "{} is already capturing",
                self.path.display()
            )));
        }

        let file = AudioFile::open(&self.path)
            .map_err(|e| SessionError::DeviceUnavailable(format!("{:#}", e)))?;

        let frames = file.frames(self.config.buffer_duration_ms);
        self.file = Some(file);

        let (tx, rx) = mpsc::channel(100);
        let interval_ms = self.config.buffer_duration_ms.max(1);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            for frame in frames {
                ticker.tick().await;
                if tx.send(frame.stamped()).await.is_err() {
                    break;
                }
            }
            info!("Audio file capture finished");
        });

        self.task = Some(task);
        info!("File capture started: {}", self.path.display());

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("File capture stopped: {}", self.path.display());
        }
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        if self.task.is_some() {
            warn!("Releasing file backend while capture task is still running");
            self.stop().await?;
        }
        self.file = None;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "WAV file"
    }
}
