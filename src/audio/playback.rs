// Gapless playback scheduling
//
// Chunks are placed back-to-back on the output clock in arrival order.
// The scheduler never reorders: the transport delivers chunks in generation
// order and the cursor simply advances by each chunk's duration.

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::codec::AudioBuffer;
use super::output::AudioOutput;

/// One scheduled chunk of synthesized audio
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    pub id: u64,
    pub buffer: Arc<AudioBuffer>,
    /// Start time on the output clock, in seconds
    pub start_time: f64,
    pub duration_seconds: f64,
}

impl PlaybackHandle {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration_seconds
    }
}

/// Owns the playback cursor and the set of queued/playing handles
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start_time: f64,
    live: BTreeMap<u64, PlaybackHandle>,
    /// Never reset, so ids stay unique across flushes and sessions
    next_id: u64,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a decoded chunk right after the previous one and start it.
    ///
    /// `now` is read from the output clock here, at enqueue time, so decode
    /// latency never shifts the schedule into the past.
    pub fn enqueue(
        &mut self,
        buffer: AudioBuffer,
        output: &mut dyn AudioOutput,
    ) -> Result<PlaybackHandle> {
        let now = output.now();
        self.next_start_time = self.next_start_time.max(now);

        self.next_id += 1;
        let handle = PlaybackHandle {
            id: self.next_id,
            duration_seconds: buffer.duration_seconds(),
            buffer: Arc::new(buffer),
            start_time: self.next_start_time,
        };

        output.play(&handle)?;
        self.next_start_time += handle.duration_seconds;
        self.live.insert(handle.id, handle.clone());

        debug!(
            "Scheduled chunk {} at {:.3}s ({:.3}s long, {} live)",
            handle.id,
            handle.start_time,
            handle.duration_seconds,
            self.live.len()
        );

        Ok(handle)
    }

    /// Handle a playback-ended notification.
    ///
    /// Returns true when this removal emptied the live set. Unknown ids
    /// (flushed or from an earlier session) are ignored.
    pub fn on_playback_ended(&mut self, id: u64) -> bool {
        match self.live.remove(&id) {
            Some(_) => self.live.is_empty(),
            None => {
                debug!("Ignoring ended notification for unknown chunk {}", id);
                false
            }
        }
    }

    /// Stop everything queued or playing and reset the cursor.
    ///
    /// Returns how many handles were live.
    pub fn flush_all(&mut self, output: &mut dyn AudioOutput) -> usize {
        let flushed = self.live.len();

        for id in std::mem::take(&mut self.live).into_keys() {
            if let Err(e) = output.stop(id) {
                debug!("{}", e);
            }
        }

        self.next_start_time = 0.0;

        if flushed > 0 {
            debug!("Flushed {} scheduled chunks", flushed);
        }

        flushed
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_idle(&self) -> bool {
        self.live.is_empty()
    }
}
