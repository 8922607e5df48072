pub mod backend;
pub mod buffer;
pub mod capture;
pub mod clock;
pub mod codec;
#[cfg(feature = "audio-io")]
pub mod input;
#[cfg(feature = "audio-io")]
pub mod output;
pub mod resampler;
pub mod scheduler;

pub use backend::AudioBackend;
#[cfg(feature = "audio-io")]
pub use backend::DeviceAudioBackend;
pub use buffer::FrameSegmenter;
pub use capture::{AudioFrame, CapturePipeline, InputSource, SampleCallback};
pub use clock::{EndedCallback, OutputClock, PlaybackBuffer, SourceId, VirtualClock};
pub use codec::{decode, encode, DecodedAudio, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
#[cfg(feature = "audio-io")]
pub use input::MicrophoneInput;
#[cfg(feature = "audio-io")]
pub use output::DeviceOutputClock;
pub use resampler::{ChunkResampler, ResampledChunk, StreamResampler};
pub use scheduler::{PlaybackScheduler, ScheduledPlayback};
