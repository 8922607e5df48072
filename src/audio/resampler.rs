use crate::{ParklinkError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::collections::VecDeque;
use tracing::debug;

/// Streaming mono resampler.
///
/// Device callbacks deliver audio in arbitrary block sizes, so input is held
/// until a full resampler chunk is available instead of zero-padding each call.
pub struct StreamResampler {
    resampler: SincFixedIn<f32>,
    pending: Vec<f32>,
    chunk_size: usize,
    input_rate: u32,
    output_rate: u32,
}

impl StreamResampler {
    /// Create a new mono resampler
    ///
    /// # Arguments
    /// * `input_rate` - Device sample rate
    /// * `output_rate` - Target sample rate
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(ParklinkError::ConfigError(
                "Sample rates must be greater than 0".into(),
            ));
        }

        let resample_ratio = output_rate as f64 / input_rate as f64;

        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };

        // Small chunks keep capture latency low
        let chunk_size = 480;

        let resampler = SincFixedIn::<f32>::new(resample_ratio, 1.0, params, chunk_size, 1)
            .map_err(|e| {
                ParklinkError::AudioProcessingError(format!("Failed to create resampler: {}", e))
            })?;

        debug!("Created resampler: {} Hz -> {} Hz", input_rate, output_rate);

        Ok(Self {
            resampler,
            pending: Vec::with_capacity(chunk_size * 2),
            chunk_size,
            input_rate,
            output_rate,
        })
    }

    /// Feed samples and return whatever output is ready
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.pending.extend_from_slice(input);

        let mut output = Vec::new();
        loop {
            let needed = self.resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }

            let input_planar = vec![self.pending.drain(..needed).collect::<Vec<f32>>()];
            let resampled = self
                .resampler
                .process(&input_planar, None)
                .map_err(|e| ParklinkError::AudioProcessingError(format!("Resampling failed: {}", e)))?;

            if let Some(channel) = resampled.into_iter().next() {
                output.extend(channel);
            }
        }

        Ok(output)
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Input samples consumed per resampler call
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Drop buffered input and reset filter state
    pub fn reset(&mut self) {
        self.pending.clear();
        self.resampler.reset();
    }
}

/// One playback chunk converted to the device rate
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledChunk {
    /// Converted audio. May run past `frames` with lookahead that the next
    /// chunk of the same run replaces.
    pub samples: Vec<f32>,
    /// Length of the chunk itself at the output rate
    pub frames: usize,
}

struct Run {
    resampler: StreamResampler,
    input_total: u64,
    output_total: u64,
    ready: VecDeque<f32>,
}

impl Run {
    fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        let resampler = StreamResampler::new(input_rate, output_rate)?;
        // Worst case of what the resampler can still be holding back
        let latency =
            (resampler.chunk_size() as f64 * output_rate as f64 / input_rate as f64).ceil() as usize + 2;
        Ok(Self {
            resampler,
            input_total: 0,
            output_total: 0,
            ready: std::iter::repeat(0.0).take(latency).collect(),
        })
    }
}

/// Resamples consecutive playback chunks as one stream.
///
/// Chunks that continue the previous one share filter state and a running
/// sample count, so joins carry neither edge transients nor rounding drift.
/// Each run starts with a fixed lead-in of silence.
pub struct ChunkResampler {
    output_rate: u32,
    run: Option<Run>,
}

impl ChunkResampler {
    pub fn new(output_rate: u32) -> Self {
        Self {
            output_rate,
            run: None,
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Convert one chunk. `continues` says it plays straight after the
    /// previous chunk; otherwise a new run begins.
    pub fn process(&mut self, samples: &[f32], input_rate: u32, continues: bool) -> Result<ResampledChunk> {
        let output_rate = self.output_rate;
        if input_rate == output_rate {
            self.run = None;
            return Ok(ResampledChunk {
                samples: samples.to_vec(),
                frames: samples.len(),
            });
        }

        let restart = !continues
            || self
                .run
                .as_ref()
                .map_or(true, |run| run.resampler.input_rate() != input_rate);
        if restart {
            debug!("New playback run: {} Hz -> {} Hz", input_rate, output_rate);
            self.run = Some(Run::new(input_rate, output_rate)?);
        }
        let run = self
            .run
            .as_mut()
            .ok_or_else(|| ParklinkError::AudioProcessingError("No playback run".into()))?;

        let converted = run.resampler.process(samples)?;
        run.ready.extend(converted);
        run.input_total += samples.len() as u64;

        let target =
            (run.input_total as f64 * output_rate as f64 / input_rate as f64).round() as u64;
        let frames = target.saturating_sub(run.output_total) as usize;
        run.output_total = target;

        if run.ready.len() < frames {
            debug!("Playback run short by {} frames", frames - run.ready.len());
            let missing = frames - run.ready.len();
            run.ready.extend(std::iter::repeat(0.0).take(missing));
        }

        let mut out: Vec<f32> = run.ready.drain(..frames).collect();
        out.extend(run.ready.iter().copied());
        Ok(ResampledChunk {
            samples: out,
            frames,
        })
    }

    /// Forget the current run
    pub fn reset(&mut self) {
        self.run = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameters() {
        assert!(StreamResampler::new(0, 16000).is_err());
        assert!(StreamResampler::new(48000, 0).is_err());
    }

    #[test]
    fn test_streaming_holds_partial_chunks() {
        let mut resampler = StreamResampler::new(48000, 16000).unwrap();
        let output = resampler.process(&[0.0; 100]).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_downsampling_ratio() {
        let mut resampler = StreamResampler::new(48000, 16000).unwrap();
        let input: Vec<f32> = (0..48000).map(|i| (i as f32 * 0.01).sin()).collect();
        let output = resampler.process(&input).unwrap();
        // roughly one third, minus what is still buffered
        assert!(output.len() > 15000 && output.len() <= 16000);
    }

    fn tone(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * 0.05).sin() * 0.5).collect()
    }

    #[test]
    fn test_chunk_lengths_do_not_drift() {
        let mut resampler = ChunkResampler::new(44100);
        let mut total = 0;
        for (i, len) in [1001usize, 2047, 333, 4096].into_iter().enumerate() {
            let chunk = resampler.process(&tone(len), 24000, i > 0).unwrap();
            assert!(chunk.samples.len() >= chunk.frames);
            total += chunk.frames;
        }
        let expected = ((1001 + 2047 + 333 + 4096) as f64 * 44100.0 / 24000.0).round() as usize;
        assert_eq!(total, expected);
    }

    #[test]
    fn test_split_chunks_match_one_stream() {
        let signal = tone(6000);

        let mut whole = ChunkResampler::new(48000);
        let reference = whole.process(&signal, 24000, false).unwrap();

        let mut split = ChunkResampler::new(48000);
        let first = split.process(&signal[..2500], 24000, false).unwrap();
        let second = split.process(&signal[2500..], 24000, true).unwrap();

        let mut joined = first.samples[..first.frames].to_vec();
        joined.extend_from_slice(&second.samples[..second.frames]);
        assert_eq!(joined, reference.samples[..reference.frames].to_vec());
    }

    #[test]
    fn test_tail_is_replaced_by_next_chunk() {
        let signal = tone(3000);
        let mut resampler = ChunkResampler::new(48000);
        let first = resampler.process(&signal[..1500], 24000, false).unwrap();
        let second = resampler.process(&signal[1500..], 24000, true).unwrap();

        let lookahead = &first.samples[first.frames..];
        assert!(!lookahead.is_empty());
        assert_eq!(lookahead, &second.samples[..lookahead.len()]);
    }

    #[test]
    fn test_matching_rate_passes_through() {
        let mut resampler = ChunkResampler::new(24000);
        let chunk = resampler.process(&[0.1, 0.2, 0.3], 24000, false).unwrap();
        assert_eq!(chunk.samples, vec![0.1, 0.2, 0.3]);
        assert_eq!(chunk.frames, 3);
    }
}
