//! Factories for the audio resources a live session acquires on start

use super::capture::InputSource;
use super::clock::{EndedCallback, OutputClock};
use crate::Result;

/// Opens microphone streams and output clocks.
///
/// Resources are opened on the session's own thread; the backend itself only
/// needs to be movable there.
pub trait AudioBackend: Send {
    /// Acquire the microphone, delivering mono audio at `sample_rate`
    fn open_input(&self, sample_rate: u32) -> Result<Box<dyn InputSource>>;

    /// Acquire an output clock running at `sample_rate`
    fn open_output(&self, sample_rate: u32, on_ended: EndedCallback) -> Result<Box<dyn OutputClock>>;
}

/// Backend using the host's default input and output devices
#[cfg(feature = "audio-io")]
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceAudioBackend;

#[cfg(feature = "audio-io")]
impl AudioBackend for DeviceAudioBackend {
    fn open_input(&self, sample_rate: u32) -> Result<Box<dyn InputSource>> {
        Ok(Box::new(super::input::MicrophoneInput::new(sample_rate)?))
    }

    fn open_output(&self, sample_rate: u32, on_ended: EndedCallback) -> Result<Box<dyn OutputClock>> {
        Ok(Box::new(super::output::DeviceOutputClock::new(
            sample_rate,
            on_ended,
        )?))
    }
}
