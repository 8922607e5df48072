//! Gapless playback scheduling on an output clock

use super::clock::{OutputClock, PlaybackBuffer, SourceId};
use crate::Result;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A buffer that has been started on the clock and not yet ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledPlayback {
    pub id: SourceId,
    pub start: f64,
    pub end: f64,
}

/// Schedules decoded audio back-to-back on an output clock.
///
/// Each buffer starts at `max(cursor, now)`, so chunks that arrive early queue
/// up without gaps and chunks that arrive late start immediately without
/// overlapping what is already playing.
pub struct PlaybackScheduler {
    clock: Option<Box<dyn OutputClock>>,
    cursor: f64,
    live: BTreeMap<SourceId, ScheduledPlayback>,
    gain: f32,
}

impl PlaybackScheduler {
    pub fn new(clock: Box<dyn OutputClock>) -> Self {
        Self::with_gain(clock, 1.0)
    }

    /// Create a scheduler that scales every buffer by `gain`
    pub fn with_gain(clock: Box<dyn OutputClock>, gain: f32) -> Self {
        let cursor = clock.current_time();
        Self {
            clock: Some(clock),
            cursor,
            live: BTreeMap::new(),
            gain,
        }
    }

    /// Schedule a buffer right after everything already queued.
    ///
    /// Returns `None` once the scheduler has been shut down.
    pub fn enqueue(&mut self, mut buffer: PlaybackBuffer) -> Result<Option<ScheduledPlayback>> {
        let Some(clock) = self.clock.as_mut() else {
            debug!("Dropping audio chunk, scheduler is shut down");
            return Ok(None);
        };

        buffer.apply_gain(self.gain);
        let duration = buffer.duration_seconds();
        let start = self.cursor.max(clock.current_time());

        let id = clock.start_at(buffer, start)?;
        let scheduled = ScheduledPlayback {
            id,
            start,
            end: start + duration,
        };

        self.cursor = scheduled.end;
        self.live.insert(id, scheduled);

        debug!(
            "Scheduled source {} at {:.3}s for {:.3}s ({} live)",
            id,
            start,
            duration,
            self.live.len()
        );

        Ok(Some(scheduled))
    }

    /// Forget a buffer that played to its end
    pub fn on_source_ended(&mut self, id: SourceId) {
        self.live.remove(&id);
    }

    /// Cut all scheduled audio immediately and drop the backlog
    pub fn interrupt(&mut self) {
        let Some(clock) = self.clock.as_mut() else {
            self.live.clear();
            return;
        };

        let stopped = self.live.len();
        for id in std::mem::take(&mut self.live).into_keys() {
            clock.stop_source(id);
        }
        self.cursor = clock.current_time();

        if stopped > 0 {
            debug!("Interrupted playback, stopped {} sources", stopped);
        }
    }

    /// Stop everything and release the clock. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.interrupt();
        if let Some(mut clock) = self.clock.take() {
            clock.close();
            info!("Output clock released");
        }
        self.cursor = 0.0;
    }

    /// Make sure the clock is running before scheduling against it
    pub fn ensure_running(&mut self) -> Result<()> {
        match self.clock.as_mut() {
            Some(clock) if clock.is_suspended() => {
                debug!("Resuming suspended output clock");
                clock.resume()
            }
            _ => Ok(()),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.clock.is_none()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live(&self) -> Vec<ScheduledPlayback> {
        self.live.values().copied().collect()
    }

    /// Time of the earliest free scheduling slot
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Seconds of scheduled audio still ahead of the clock
    pub fn backlog(&self) -> f64 {
        match self.clock.as_ref() {
            Some(clock) => (self.cursor - clock.current_time()).max(0.0),
            None => 0.0,
        }
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clock::VirtualClock;

    fn buffer(seconds: f64) -> PlaybackBuffer {
        PlaybackBuffer::mono(vec![0.1; (seconds * 24000.0) as usize], 24000)
    }

    #[test]
    fn test_back_to_back_scheduling() {
        let clock = VirtualClock::new(24000);
        let mut scheduler = PlaybackScheduler::new(Box::new(clock.clone()));

        let a = scheduler.enqueue(buffer(0.5)).unwrap().unwrap();
        let b = scheduler.enqueue(buffer(0.25)).unwrap().unwrap();
        let c = scheduler.enqueue(buffer(1.0)).unwrap().unwrap();

        assert_eq!(a.start, 0.0);
        assert_eq!(b.start, 0.5);
        assert_eq!(c.start, 0.75);
        assert_eq!(scheduler.cursor(), 1.75);
        assert_eq!(scheduler.live_count(), 3);
        assert_eq!(clock.playing().len(), 3);
    }

    #[test]
    fn test_late_chunk_starts_now() {
        let clock = VirtualClock::new(24000);
        let mut scheduler = PlaybackScheduler::new(Box::new(clock.clone()));

        scheduler.enqueue(buffer(0.25)).unwrap();
        clock.advance(1.0);

        let late = scheduler.enqueue(buffer(0.5)).unwrap().unwrap();
        assert_eq!(late.start, 1.0);
        assert_eq!(scheduler.backlog(), 0.5);
    }

    #[test]
    fn test_interrupt_clears_backlog() {
        let clock = VirtualClock::new(24000);
        let mut scheduler = PlaybackScheduler::new(Box::new(clock.clone()));

        for _ in 0..3 {
            scheduler.enqueue(buffer(0.5)).unwrap();
        }
        clock.advance(0.25);
        scheduler.interrupt();

        assert_eq!(scheduler.live_count(), 0);
        assert_eq!(scheduler.backlog(), 0.0);
        assert_eq!(scheduler.cursor(), 0.25);
        assert!(clock.playing().is_empty());
        assert_eq!(clock.stopped().len(), 3);

        // scheduling resumes from the current time
        let next = scheduler.enqueue(buffer(0.5)).unwrap().unwrap();
        assert_eq!(next.start, 0.25);
    }

    #[test]
    fn test_ended_sources_leave_live_set() {
        let clock = VirtualClock::new(24000);
        let mut scheduler = PlaybackScheduler::new(Box::new(clock.clone()));

        let first = scheduler.enqueue(buffer(0.5)).unwrap().unwrap();
        scheduler.enqueue(buffer(0.5)).unwrap();
        clock.advance(0.5);

        scheduler.on_source_ended(first.id);
        assert_eq!(scheduler.live_count(), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let clock = VirtualClock::new(24000);
        let mut scheduler = PlaybackScheduler::new(Box::new(clock.clone()));
        scheduler.enqueue(buffer(0.5)).unwrap();

        scheduler.shutdown();
        scheduler.shutdown();

        assert!(scheduler.is_shut_down());
        assert!(clock.is_closed());
        assert_eq!(scheduler.live_count(), 0);
        assert!(scheduler.enqueue(buffer(0.5)).unwrap().is_none());
    }

    #[test]
    fn test_gain_is_applied() {
        let clock = VirtualClock::new(24000);
        let mut scheduler = PlaybackScheduler::with_gain(Box::new(clock.clone()), 2.0);
        scheduler.enqueue(buffer(0.01)).unwrap();
        assert_eq!(clock.playing()[0].buffer.channels[0][0], 0.2);
    }

    #[test]
    fn test_resumes_suspended_clock() {
        let clock = VirtualClock::new(24000);
        clock.suspend();
        let mut scheduler = PlaybackScheduler::new(Box::new(clock.clone()));
        scheduler.ensure_running().unwrap();
        assert!(!clock.is_suspended());
    }
}
