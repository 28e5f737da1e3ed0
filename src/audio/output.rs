// Audio output devices
//
// An output owns the clock the scheduler plans against and reports, over
// the channel handed to `open`, the id of every chunk that finishes.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::playback::PlaybackHandle;
use crate::error::PlaybackStopFailure;

/// Synthesized-voice output device
pub trait AudioOutput: Send {
    /// Acquire the device. Ended chunk ids are sent on `ended`.
    fn open(&mut self, ended: mpsc::UnboundedSender<u64>) -> Result<()>;

    /// Current output clock time in seconds
    fn now(&self) -> f64;

    /// Begin playing `handle` at its scheduled start time
    fn play(&mut self, handle: &PlaybackHandle) -> Result<()>;

    /// Force-stop a chunk. Fails if it has already ended.
    fn stop(&mut self, id: u64) -> Result<(), PlaybackStopFailure>;

    /// Release the device
    fn release(&mut self) -> Result<()>;
}

/// Output that "plays" chunks against a monotonic clock.
///
/// Each chunk gets a timer that fires at its scheduled end time and
/// reports completion, which is all the session needs from a speaker.
pub struct TimedOutput {
    origin: Instant,
    ended_tx: Option<mpsc::UnboundedSender<u64>>,
    timers: HashMap<u64, JoinHandle<()>>,
    samples_played: u64,
}

impl TimedOutput {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            ended_tx: None,
            timers: HashMap::new(),
            samples_played: 0,
        }
    }

    /// Total samples handed to the device since construction
    pub fn samples_played(&self) -> u64 {
        self.samples_played
    }
}

impl Default for TimedOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for TimedOutput {
    fn open(&mut self, ended: mpsc::UnboundedSender<u64>) -> Result<()> {
        if self.ended_tx.is_some() {
            bail!("Output device already open");
        }
        self.ended_tx = Some(ended);
        info!("Audio output opened");
        Ok(())
    }

    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn play(&mut self, handle: &PlaybackHandle) -> Result<()> {
        let Some(ended_tx) = self.ended_tx.clone() else {
            bail!("Output device is not open");
        };

        self.timers.retain(|_, timer| !timer.is_finished());

        let end_at = self.origin + Duration::from_secs_f64(handle.end_time().max(0.0));
        let id = handle.id;
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(end_at).await;
            let _ = ended_tx.send(id);
        });

        self.samples_played += handle.buffer.samples.len() as u64;
        self.timers.insert(id, timer);
        Ok(())
    }

    fn stop(&mut self, id: u64) -> Result<(), PlaybackStopFailure> {
        match self.timers.remove(&id) {
            Some(timer) if !timer.is_finished() => {
                timer.abort();
                Ok(())
            }
            _ => Err(PlaybackStopFailure { id }),
        }
    }

    fn release(&mut self) -> Result<()> {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        if self.ended_tx.take().is_some() {
            debug!("Audio output released ({} samples played)", self.samples_played);
        }
        Ok(())
    }
}
