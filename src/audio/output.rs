use super::clock::{EndedCallback, OutputClock, PlaybackBuffer, SourceId};
use super::resampler::ChunkResampler;
use crate::{ParklinkError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

struct Voice {
    id: SourceId,
    /// Playback run the voice belongs to
    run: u64,
    start_frame: u64,
    samples: Vec<f32>,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

#[derive(Default)]
struct Mixer {
    /// Frames rendered since the clock was opened
    position: u64,
    voices: Vec<Voice>,
}

impl Mixer {
    /// Cut earlier voices of `run` short at `frame`, where the next chunk
    /// of the run takes over
    fn join_run(&mut self, run: u64, frame: u64) {
        for voice in self.voices.iter_mut().filter(|v| v.run == run) {
            if voice.start_frame < frame && voice.end_frame() > frame {
                voice.samples.truncate((frame - voice.start_frame) as usize);
            }
        }
    }

    /// Render one block and return the ids of voices that finished in it
    fn render(&mut self, data: &mut [f32], channels: usize) -> Vec<SourceId> {
        data.fill(0.0);
        let frames = (data.len() / channels) as u64;
        let block_start = self.position;
        let block_end = block_start + frames;

        for voice in &self.voices {
            let from = voice.start_frame.max(block_start);
            let to = voice.end_frame().min(block_end);
            for frame in from..to {
                let sample = voice.samples[(frame - voice.start_frame) as usize];
                let offset = ((frame - block_start) as usize) * channels;
                for out in &mut data[offset..offset + channels] {
                    *out += sample;
                }
            }
        }

        for out in data.iter_mut() {
            *out = out.clamp(-1.0, 1.0);
        }

        self.position = block_end;

        let mut ended = Vec::new();
        self.voices.retain(|voice| {
            if voice.end_frame() <= block_end {
                ended.push(voice.id);
                false
            } else {
                true
            }
        });
        ended
    }
}

/// Output clock backed by the default output device.
///
/// Time is counted in rendered device frames, so scheduling is sample
/// accurate relative to what has actually been played.
pub struct DeviceOutputClock {
    device: Device,
    config: StreamConfig,
    nominal_rate: u32,
    stream: Option<Stream>,
    mixer: Arc<Mutex<Mixer>>,
    resampler: ChunkResampler,
    run: u64,
    /// Device frame where the current run's last chunk ends
    run_end: Option<u64>,
    next_id: SourceId,
}

impl DeviceOutputClock {
    /// Open the default output device and start its clock
    pub fn new(nominal_rate: u32, on_ended: EndedCallback) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| ParklinkError::AcquisitionError("No output device available".into()))?;

        info!(
            "Using output device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let config = pick_output_config(&device, nominal_rate)?;
        let mixer = Arc::new(Mutex::new(Mixer::default()));

        let channels = config.channels as usize;
        let mixer_clone = Arc::clone(&mixer);

        let err_fn = |err| {
            error!("Audio output stream error: {}", err);
        };

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let ended = mixer_clone.lock().render(data, channels);
                    for id in ended {
                        on_ended(id);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| {
                ParklinkError::AcquisitionError(format!("Failed to build output stream: {}", e))
            })?;

        stream.play().map_err(|e| {
            ParklinkError::AcquisitionError(format!("Failed to start output stream: {}", e))
        })?;

        let device_rate = config.sample_rate.0;
        info!("Output clock running at {} Hz", device_rate);

        Ok(Self {
            device,
            config,
            nominal_rate,
            stream: Some(stream),
            mixer,
            resampler: ChunkResampler::new(device_rate),
            run: 0,
            run_end: None,
            next_id: 0,
        })
    }

    pub fn device_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }
}

fn pick_output_config(device: &Device, target_rate: u32) -> Result<StreamConfig> {
    if let Ok(mut ranges) = device.supported_output_configs() {
        let native = ranges.find(|range| {
            range.sample_format() == cpal::SampleFormat::F32
                && range.min_sample_rate().0 <= target_rate
                && range.max_sample_rate().0 >= target_rate
        });
        if let Some(range) = native {
            return Ok(range.with_sample_rate(SampleRate(target_rate)).into());
        }
    }

    device
        .default_output_config()
        .map(Into::into)
        .map_err(|e| ParklinkError::AcquisitionError(format!("Failed to get output config: {}", e)))
}

impl OutputClock for DeviceOutputClock {
    fn sample_rate(&self) -> u32 {
        self.nominal_rate
    }

    fn current_time(&self) -> f64 {
        self.mixer.lock().position as f64 / self.device_rate() as f64
    }

    /// cpal streams keep running once played
    fn is_suspended(&self) -> bool {
        false
    }

    fn resume(&mut self) -> Result<()> {
        let stream = self.stream.as_ref().ok_or_else(|| {
            ParklinkError::AudioProcessingError("Cannot resume a closed output clock".into())
        })?;
        stream.play().map_err(|e| {
            ParklinkError::AudioProcessingError(format!("Failed to resume output: {}", e))
        })?;
        Ok(())
    }

    fn start_at(&mut self, buffer: PlaybackBuffer, when: f64) -> Result<SourceId> {
        if self.stream.is_none() {
            return Err(ParklinkError::AudioProcessingError(
                "Cannot start audio on a closed output clock".into(),
            ));
        }

        let device_rate = self.device_rate();
        let mono = buffer.mix_to_mono();

        let id = self.next_id;
        self.next_id += 1;

        let position = self.mixer.lock().position;
        let requested = (when * device_rate as f64).round().max(0.0) as u64;
        let mut start_frame = requested.max(position);
        if start_frame > requested {
            debug!(
                "Source {} starts {} frames late",
                id,
                start_frame - requested
            );
        }

        // Back-to-back chunks are resampled as one stream
        let continues = match self.run_end {
            Some(end) if start_frame.abs_diff(end) <= 1 => {
                start_frame = end;
                true
            }
            _ => false,
        };
        if !continues {
            self.run += 1;
        }
        // Not under the mixer lock
        let chunk = self.resampler.process(&mono, buffer.sample_rate, continues)?;
        let mut mixer = self.mixer.lock();
        if continues {
            mixer.join_run(self.run, start_frame);
        }
        self.run_end = Some(start_frame + chunk.frames as u64);

        mixer.voices.push(Voice {
            id,
            run: self.run,
            start_frame,
            samples: chunk.samples,
        });

        Ok(id)
    }

    fn stop_source(&mut self, id: SourceId) {
        self.mixer.lock().voices.retain(|voice| voice.id != id);
    }

    fn close(&mut self) {
        self.mixer.lock().voices.clear();
        self.resampler.reset();
        self.run_end = None;
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause output before close: {}", e);
            }
            drop(stream);
            info!("Output clock closed");
        }
    }
}

impl Drop for DeviceOutputClock {
    fn drop(&mut self) {
        self.close();
    }
}
