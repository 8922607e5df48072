use ringbuf::{traits::*, HeapRb};

/// Default frame length: 4096 samples, 256 ms at 16 kHz
pub const DEFAULT_FRAME_SAMPLES: usize = 4096;

/// Ring buffer that cuts a live sample stream into fixed-length frames
pub struct FrameSegmenter {
    ring: HeapRb<f32>,
    frame_len: usize,
}

impl FrameSegmenter {
    /// Create a segmenter emitting frames of `frame_len` samples
    pub fn new(frame_len: usize) -> Self {
        let frame_len = frame_len.max(1);
        Self {
            ring: HeapRb::new(frame_len),
            frame_len,
        }
    }

    /// Write samples and collect every frame they complete, in capture order
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        let mut frames = Vec::new();
        let mut rest = samples;

        while !rest.is_empty() {
            let written = self.ring.push_slice(rest);
            rest = &rest[written..];

            if self.ring.occupied_len() >= self.frame_len {
                let mut frame = vec![0.0f32; self.frame_len];
                self.ring.pop_slice(&mut frame);
                frames.push(frame);
            }
        }

        frames
    }

    /// Samples held back waiting for the current frame to fill
    pub fn pending(&self) -> usize {
        self.ring.occupied_len()
    }

    /// Drop any partially filled frame
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_frames() {
        let mut segmenter = FrameSegmenter::new(4);
        let data: Vec<f32> = (0..8).map(|i| i as f32).collect();

        let frames = segmenter.push(&data);
        assert_eq!(frames, vec![vec![0.0, 1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0, 7.0]]);
        assert_eq!(segmenter.pending(), 0);
    }

    #[test]
    fn test_partial_frames_carry_over() {
        let mut segmenter = FrameSegmenter::new(4);

        assert!(segmenter.push(&[1.0, 2.0, 3.0]).is_empty());
        assert_eq!(segmenter.pending(), 3);

        let frames = segmenter.push(&[4.0, 5.0]);
        assert_eq!(frames, vec![vec![1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(segmenter.pending(), 1);
    }

    #[test]
    fn test_large_chunk_larger_than_capacity() {
        let mut segmenter = FrameSegmenter::new(3);
        let data: Vec<f32> = (0..10).map(|i| i as f32).collect();

        let frames = segmenter.push(&data);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2], vec![6.0, 7.0, 8.0]);
        assert_eq!(segmenter.pending(), 1);
    }

    #[test]
    fn test_clear() {
        let mut segmenter = FrameSegmenter::new(4);
        segmenter.push(&[1.0, 2.0]);
        segmenter.clear();
        assert_eq!(segmenter.pending(), 0);
        assert_eq!(segmenter.push(&[9.0; 4]).len(), 1);
    }
}
