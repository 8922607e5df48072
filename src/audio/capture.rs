//! Microphone capture, framing and the mute gate

use super::buffer::FrameSegmenter;
use super::codec::{self, INPUT_MIME_TYPE};
use crate::link::protocol::Blob;
use crate::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Receives blocks of mono samples from an input source, on the source's thread
pub type SampleCallback = Box<dyn FnMut(&[f32]) + Send>;

/// A live microphone stream delivering mono samples at a fixed rate
pub trait InputSource {
    /// Rate of the samples handed to the callback
    fn sample_rate(&self) -> u32;

    /// Begin delivering samples
    fn start(&mut self, on_samples: SampleCallback) -> Result<()>;

    /// Stop delivering samples and release the device
    fn stop(&mut self);
}

/// One fixed-length block of captured mono audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Arc<[f32]>,
    sample_rate: u32,
    sequence: u64,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32, sequence: u64) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            sequence,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Position of this frame in capture order
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Encode as an outbound link media chunk
    pub fn to_media_chunk(&self) -> Blob {
        Blob {
            mime_type: INPUT_MIME_TYPE.to_string(),
            data: codec::encode(&self.samples),
        }
    }
}

/// Segments a microphone stream into frames and gates them on the mute flag.
///
/// Muting is a hard gate: frames completed while muted are dropped, never
/// queued for later.
pub struct CapturePipeline {
    frame_len: usize,
    muted: Arc<AtomicBool>,
    source: Option<Box<dyn InputSource>>,
    frames_sent: Arc<AtomicU64>,
    frames_dropped: Arc<AtomicU64>,
}

impl CapturePipeline {
    /// Create a pipeline; it starts muted
    pub fn new(frame_len: usize) -> Self {
        Self::with_mute_flag(frame_len, Arc::new(AtomicBool::new(true)))
    }

    /// Create a pipeline gated on an externally owned mute flag
    pub fn with_mute_flag(frame_len: usize, muted: Arc<AtomicBool>) -> Self {
        Self {
            frame_len,
            muted,
            source: None,
            frames_sent: Arc::new(AtomicU64::new(0)),
            frames_dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start pulling `source`, handing every unmuted frame to `on_frame`
    pub fn start<F>(&mut self, mut source: Box<dyn InputSource>, mut on_frame: F) -> Result<()>
    where
        F: FnMut(AudioFrame) + Send + 'static,
    {
        self.stop();

        let sample_rate = source.sample_rate();
        let muted = Arc::clone(&self.muted);
        let frames_sent = Arc::clone(&self.frames_sent);
        let frames_dropped = Arc::clone(&self.frames_dropped);
        let mut segmenter = FrameSegmenter::new(self.frame_len);
        let mut sequence = 0u64;

        source.start(Box::new(move |samples: &[f32]| {
            for frame in segmenter.push(samples) {
                sequence += 1;
                // Gate is read at the frame boundary
                if muted.load(Ordering::SeqCst) {
                    frames_dropped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                frames_sent.fetch_add(1, Ordering::Relaxed);
                on_frame(AudioFrame::new(frame, sample_rate, sequence));
            }
        }))?;

        info!(
            "Capture started: {} Hz, {} samples per frame",
            sample_rate, self.frame_len
        );
        self.source = Some(source);
        Ok(())
    }

    pub fn set_muted(&self, muted: bool) {
        let previous = self.muted.swap(muted, Ordering::SeqCst);
        if previous != muted {
            debug!("Capture {}", if muted { "muted" } else { "unmuted" });
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Shared mute flag, for handles that must toggle it without the pipeline
    pub fn mute_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.muted)
    }

    /// Stop capture and release the input source. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            info!(
                "Capture stopped ({} frames sent, {} dropped while muted)",
                self.frames_sent.load(Ordering::Relaxed),
                self.frames_dropped.load(Ordering::Relaxed)
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.source.is_some()
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Input source that hands its callback back to the test
    #[derive(Clone, Default)]
    struct ManualSource {
        callback: Arc<Mutex<Option<SampleCallback>>>,
        stops: Arc<AtomicU64>,
    }

    impl ManualSource {
        fn feed(&self, samples: &[f32]) {
            if let Some(callback) = self.callback.lock().as_mut() {
                callback(samples);
            }
        }
    }

    impl InputSource for ManualSource {
        fn sample_rate(&self) -> u32 {
            16000
        }

        fn start(&mut self, on_samples: SampleCallback) -> Result<()> {
            *self.callback.lock() = Some(on_samples);
            Ok(())
        }

        fn stop(&mut self) {
            self.callback.lock().take();
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn collecting_pipeline(
        source: &ManualSource,
    ) -> (CapturePipeline, Arc<Mutex<Vec<AudioFrame>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);
        let mut pipeline = CapturePipeline::new(4);
        pipeline
            .start(Box::new(source.clone()), move |frame| sink.lock().push(frame))
            .unwrap();
        (pipeline, frames)
    }

    #[test]
    fn test_starts_muted() {
        let source = ManualSource::default();
        let (pipeline, frames) = collecting_pipeline(&source);

        source.feed(&[0.1; 12]);
        assert!(pipeline.is_muted());
        assert!(frames.lock().is_empty());
        assert_eq!(pipeline.frames_dropped(), 3);
    }

    #[test]
    fn test_mute_gate_drops_without_backlog() {
        let source = ManualSource::default();
        let (pipeline, frames) = collecting_pipeline(&source);

        source.feed(&[0.1; 12]);
        pipeline.set_muted(false);
        source.feed(&[0.2; 4]);

        let frames = frames.lock();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples(), &[0.2; 4]);
        assert_eq!(frames[0].sequence(), 4);
    }

    #[test]
    fn test_frames_keep_capture_order() {
        let source = ManualSource::default();
        let (pipeline, frames) = collecting_pipeline(&source);
        pipeline.set_muted(false);

        source.feed(&[0.0, 1.0, 2.0]);
        source.feed(&[3.0, 4.0, 5.0, 6.0, 7.0]);

        let frames = frames.lock();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].samples(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(frames[1].samples(), &[4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let source = ManualSource::default();
        let (mut pipeline, _frames) = collecting_pipeline(&source);

        pipeline.stop();
        pipeline.stop();
        assert!(!pipeline.is_running());
        assert_eq!(source.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_media_chunk() {
        let frame = AudioFrame::new(vec![0.0; 2], 16000, 1);
        let chunk = frame.to_media_chunk();
        assert_eq!(chunk.mime_type, "audio/pcm;rate=16000");
        assert_eq!(chunk.data, "AAAAAA==");
    }
}
