//! Output audio clocks
//!
//! An output clock owns a monotonic time cursor (seconds since it was opened)
//! and can start a buffer at an absolute time on that cursor, stop it early,
//! and report when it finishes.

use super::codec::DecodedAudio;
use crate::{ParklinkError, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Identifier of a buffer started on an output clock
pub type SourceId = u64;

/// Called from the clock when a started buffer plays out to its end
pub type EndedCallback = Arc<dyn Fn(SourceId) + Send + Sync>;

/// Planar audio ready to be started on an output clock
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackBuffer {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl PlaybackBuffer {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Scale every sample by `gain`
    pub fn apply_gain(&mut self, gain: f32) {
        if gain == 1.0 {
            return;
        }
        for channel in &mut self.channels {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Average all channels down to one
    pub fn mix_to_mono(&self) -> Vec<f32> {
        match self.channels.len() {
            0 => Vec::new(),
            1 => self.channels[0].clone(),
            count => (0..self.frames())
                .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() / count as f32)
                .collect(),
        }
    }
}

impl From<DecodedAudio> for PlaybackBuffer {
    fn from(audio: DecodedAudio) -> Self {
        Self {
            channels: audio.channels,
            sample_rate: audio.sample_rate,
        }
    }
}

/// An output audio clock that buffers can be scheduled against
pub trait OutputClock {
    /// Nominal sample rate of the clock
    fn sample_rate(&self) -> u32;

    /// Current clock position in seconds
    fn current_time(&self) -> f64;

    /// Whether the platform has suspended the clock
    fn is_suspended(&self) -> bool;

    /// Resume a suspended clock
    fn resume(&mut self) -> Result<()>;

    /// Start `buffer` at clock time `when` (or immediately if `when` has passed)
    fn start_at(&mut self, buffer: PlaybackBuffer, when: f64) -> Result<SourceId>;

    /// Silence a started buffer immediately. Unknown ids are ignored.
    fn stop_source(&mut self, id: SourceId);

    /// Stop everything and release the underlying device
    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualSource {
    pub id: SourceId,
    pub start: f64,
    pub end: f64,
    pub buffer: PlaybackBuffer,
}

#[derive(Default)]
struct VirtualState {
    now: f64,
    suspended: bool,
    closed: bool,
    next_id: SourceId,
    sources: BTreeMap<SourceId, VirtualSource>,
    stopped: Vec<(SourceId, f64)>,
    finished: Vec<SourceId>,
    on_ended: Option<EndedCallback>,
}

/// Output clock whose time only moves when told to.
///
/// Cloning yields another handle onto the same clock, so a test can keep one
/// handle while the scheduler owns another.
#[derive(Clone)]
pub struct VirtualClock {
    sample_rate: u32,
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            state: Arc::new(Mutex::new(VirtualState::default())),
        }
    }

    /// Register the ended notification
    pub fn set_on_ended(&self, on_ended: EndedCallback) {
        self.state.lock().on_ended = Some(on_ended);
    }

    /// Move time forward, firing ended notifications for buffers that finish
    pub fn advance(&self, seconds: f64) {
        let (ended, callback) = {
            let mut state = self.state.lock();
            if state.suspended || state.closed {
                return;
            }
            state.now += seconds;
            let now = state.now;

            let mut done: Vec<(f64, SourceId)> = state
                .sources
                .values()
                .filter(|s| s.end <= now)
                .map(|s| (s.end, s.id))
                .collect();
            done.sort_by(|a, b| a.0.total_cmp(&b.0));

            let ids: Vec<SourceId> = done.into_iter().map(|(_, id)| id).collect();
            for id in &ids {
                state.sources.remove(id);
                state.finished.push(*id);
            }
            (ids, state.on_ended.clone())
        };

        if let Some(callback) = callback {
            for id in ended {
                callback(id);
            }
        }
    }

    /// Simulate the platform suspending the clock
    pub fn suspend(&self) {
        self.state.lock().suspended = true;
    }

    pub fn now(&self) -> f64 {
        self.state.lock().now
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Buffers started and not yet finished or stopped, in id order
    pub fn playing(&self) -> Vec<VirtualSource> {
        self.state.lock().sources.values().cloned().collect()
    }

    /// Buffers stopped early with the clock time they were cut at
    pub fn stopped(&self) -> Vec<(SourceId, f64)> {
        self.state.lock().stopped.clone()
    }

    /// Buffers that played to their end
    pub fn finished(&self) -> Vec<SourceId> {
        self.state.lock().finished.clone()
    }
}

impl OutputClock for VirtualClock {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.state.lock().now
    }

    fn is_suspended(&self) -> bool {
        self.state.lock().suspended
    }

    fn resume(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ParklinkError::AudioProcessingError(
                "Cannot resume a closed clock".into(),
            ));
        }
        state.suspended = false;
        Ok(())
    }

    fn start_at(&mut self, buffer: PlaybackBuffer, when: f64) -> Result<SourceId> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ParklinkError::AudioProcessingError(
                "Cannot start audio on a closed clock".into(),
            ));
        }

        let id = state.next_id;
        state.next_id += 1;

        let start = when.max(state.now);
        let end = start + buffer.duration_seconds();
        state.sources.insert(
            id,
            VirtualSource {
                id,
                start,
                end,
                buffer,
            },
        );
        Ok(id)
    }

    fn stop_source(&mut self, id: SourceId) {
        let mut state = self.state.lock();
        if state.sources.remove(&id).is_some() {
            let now = state.now;
            state.stopped.push((id, now));
        }
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        let now = state.now;
        let ids: Vec<SourceId> = state.sources.keys().copied().collect();
        for id in ids {
            state.sources.remove(&id);
            state.stopped.push((id, now));
        }
        state.closed = true;
        debug!("Virtual clock closed at {:.3}s", now);
    }
}
