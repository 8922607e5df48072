//! Wire codec for link audio
//!
//! The link carries mono 16-bit little-endian PCM wrapped in base64. Outbound
//! audio is 16 kHz, inbound model audio is 24 kHz.

use crate::{ParklinkError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Sample rate of microphone audio sent over the link
pub const INPUT_SAMPLE_RATE: u32 = 16000;

/// Sample rate of model audio received from the link
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

/// MIME type attached to every outbound audio chunk
pub const INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";

const PCM_SCALE: f32 = 32768.0;

/// Audio decoded from a link payload, one sample vector per channel
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Number of sample frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Convert one float sample to the wire integer.
///
/// Truncates toward zero and wraps into 16 bits; samples outside [-1, 1] are
/// not clipped, so `1.0` comes out as `i16::MIN`.
#[inline]
pub fn sample_to_pcm(sample: f32) -> i16 {
    ((sample * PCM_SCALE) as i32) as i16
}

#[inline]
pub fn pcm_to_sample(value: i16) -> f32 {
    value as f32 / PCM_SCALE
}

/// Encode float samples as base64 16-bit little-endian PCM
pub fn encode(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample_to_pcm(sample).to_le_bytes());
    }
    BASE64.encode(bytes)
}

/// Decode a base64 PCM payload into per-channel float samples.
///
/// An odd byte count is padded with a trailing zero byte rather than rejected.
/// Only a zero channel count is reported as malformed audio.
pub fn decode(payload: &str, sample_rate: u32, channels: u16) -> Result<DecodedAudio> {
    if channels == 0 {
        return Err(ParklinkError::MalformedAudioError(
            "Channel count must be greater than 0".into(),
        ));
    }

    let mut bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| ParklinkError::InvalidPayloadError(format!("Bad base64 audio: {}", e)))?;

    if bytes.len() % 2 != 0 {
        bytes.push(0);
    }

    let pcm: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let channel_count = channels as usize;
    let frames = pcm.len() / channel_count;
    let mut planar = vec![Vec::with_capacity(frames); channel_count];

    for frame in pcm.chunks_exact(channel_count) {
        for (channel, &value) in planar.iter_mut().zip(frame) {
            channel.push(pcm_to_sample(value));
        }
    }

    Ok(DecodedAudio {
        channels: planar,
        sample_rate,
    })
}

/// Extract the sample rate from a PCM mime type such as `audio/pcm;rate=24000`
pub fn parse_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse().ok())
}

/// Whether a mime type names raw PCM audio
pub fn is_pcm_audio(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("audio/pcm")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_within_quantization_bound() {
        let input: Vec<f32> = (0..480)
            .map(|i| (i as f32 * 0.05).sin() * 0.9)
            .chain([0.0, -1.0, 0.999, -0.5])
            .collect();

        let decoded = decode(&encode(&input), INPUT_SAMPLE_RATE, 1).unwrap();
        assert_eq!(decoded.frames(), input.len());

        for (original, restored) in input.iter().zip(&decoded.channels[0]) {
            assert!((original - restored).abs() <= 1.0 / 32768.0);
        }
    }

    #[test]
    fn test_encode_layout_is_little_endian() {
        let encoded = encode(&[0.5]);
        let bytes = BASE64.decode(encoded).unwrap();
        assert_eq!(bytes, vec![0x00, 0x40]);
    }

    #[test]
    fn test_out_of_range_sample_wraps() {
        assert_eq!(sample_to_pcm(1.0), i16::MIN);
        assert_eq!(sample_to_pcm(-1.0), i16::MIN);
        assert_eq!(sample_to_pcm(0.25), 8192);
        assert_eq!(sample_to_pcm(-0.25), -8192);
    }

    #[test]
    fn test_odd_length_payload_is_padded() {
        // three zero bytes -> padded to four -> two samples
        let decoded = decode("AAAA", OUTPUT_SAMPLE_RATE, 1).unwrap();
        assert_eq!(decoded.channels, vec![vec![0.0, 0.0]]);

        // two bytes -> one sample
        let decoded = decode("AAA=", OUTPUT_SAMPLE_RATE, 1).unwrap();
        assert_eq!(decoded.frames(), 1);

        // single byte 0xFF padded with 0x00 -> 255
        let decoded = decode("/w==", OUTPUT_SAMPLE_RATE, 1).unwrap();
        assert_eq!(decoded.channels[0], vec![255.0 / 32768.0]);
    }

    #[test]
    fn test_zero_channels_is_malformed() {
        let result = decode("AAAA", OUTPUT_SAMPLE_RATE, 0);
        assert!(matches!(result, Err(ParklinkError::MalformedAudioError(_))));
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let result = decode("not base64!", OUTPUT_SAMPLE_RATE, 1);
        assert!(matches!(result, Err(ParklinkError::InvalidPayloadError(_))));
    }

    #[test]
    fn test_deinterleave_stereo() {
        let encoded = encode(&[0.5, -0.5, 0.25, -0.25]);
        let decoded = decode(&encoded, 48000, 2).unwrap();
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.channels[0], vec![0.5, 0.25]);
        assert_eq!(decoded.channels[1], vec![-0.5, -0.25]);
    }

    #[test]
    fn test_duration() {
        let decoded = decode(&encode(&vec![0.0; 24000]), OUTPUT_SAMPLE_RATE, 1).unwrap();
        assert!((decoded.duration_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("audio/pcm;rate=24000"), Some(24000));
        assert_eq!(parse_rate("audio/pcm; rate=16000"), Some(16000));
        assert_eq!(parse_rate("audio/pcm"), None);
        assert!(is_pcm_audio("audio/pcm;rate=24000"));
        assert!(!is_pcm_audio("image/png"));
    }
}
