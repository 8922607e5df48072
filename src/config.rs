//! Configuration for the voice uplink
//!
//! Defaults match the hosted backend's live-audio contract; a TOML file can
//! override any field.

use crate::audio::buffer::DEFAULT_FRAME_SAMPLES;
use crate::audio::codec::{INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
use crate::{ParklinkError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variables checked, in order, for the backend API key
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Link endpoint settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// WebSocket endpoint of the live API
    pub endpoint: String,

    /// Live model identifier
    pub model: String,

    /// API key; never written back out
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_LIVE_MODEL.to_string(),
            api_key: None,
        }
    }
}

impl LinkConfig {
    /// Full connection URL including the key query parameter
    pub fn url(&self) -> String {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => {
                let separator = if self.endpoint.contains('?') { '&' } else { '?' };
                format!("{}{}key={}", self.endpoint, separator, key)
            }
            _ => self.endpoint.clone(),
        }
    }

    /// Fill in the API key from the environment if it is not set
    pub fn with_env_key(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = API_KEY_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok())
                .filter(|key| !key.trim().is_empty());
        }
        self
    }
}

/// Audio pipeline settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Rate microphone audio is sent at
    pub input_sample_rate: u32,

    /// Rate model audio arrives at
    pub output_sample_rate: u32,

    /// Samples per captured frame
    pub frame_samples: usize,

    /// Gain applied to model speech on playback
    pub output_gain: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: INPUT_SAMPLE_RATE,
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            frame_samples: DEFAULT_FRAME_SAMPLES,
            output_gain: 1.2,
        }
    }
}

/// Complete configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParklinkConfig {
    pub link: LinkConfig,
    pub audio: AudioConfig,

    /// Capacity of the session's command and event channels
    pub channel_buffer_size: usize,
}

impl ParklinkConfig {
    pub fn new() -> Self {
        Self {
            channel_buffer_size: 256,
            ..Default::default()
        }
    }

    /// Parse a TOML document; missing fields take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(text)
            .map_err(|e| ParklinkError::ConfigError(format!("Invalid config: {}", e)))?;
        if config.channel_buffer_size == 0 {
            config.channel_buffer_size = 256;
        }
        Ok(config)
    }

    /// Load a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ParklinkError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    pub fn with_link(mut self, link: LinkConfig) -> Self {
        self.link = link;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.link.api_key = Some(key.into());
        self
    }

    pub fn with_frame_samples(mut self, frame_samples: usize) -> Self {
        self.audio.frame_samples = frame_samples;
        self
    }

    pub fn with_output_gain(mut self, gain: f32) -> Self {
        self.audio.output_gain = gain;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.link.endpoint.is_empty() {
            return Err(ParklinkError::ConfigError("Link endpoint is required".into()));
        }
        if !self.link.endpoint.starts_with("ws://") && !self.link.endpoint.starts_with("wss://") {
            return Err(ParklinkError::ConfigError(format!(
                "Link endpoint must be a ws:// or wss:// URL: {}",
                self.link.endpoint
            )));
        }
        if self.link.model.trim().is_empty() {
            return Err(ParklinkError::ConfigError("Live model is required".into()));
        }
        if self.audio.input_sample_rate == 0 || self.audio.output_sample_rate == 0 {
            return Err(ParklinkError::ConfigError(
                "Sample rates must be greater than 0".into(),
            ));
        }
        if self.audio.frame_samples == 0 {
            return Err(ParklinkError::ConfigError(
                "Frame size must be greater than 0".into(),
            ));
        }
        if !(0.0..=4.0).contains(&self.audio.output_gain) {
            return Err(ParklinkError::ConfigError(format!(
                "Output gain out of range: {}",
                self.audio.output_gain
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ParklinkConfig::new();
        assert_eq!(config.audio.input_sample_rate, 16000);
        assert_eq!(config.audio.output_sample_rate, 24000);
        assert_eq!(config.audio.frame_samples, 4096);
        assert_eq!(config.channel_buffer_size, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = ParklinkConfig::from_toml_str(
            r#"
            [link]
            model = "test-live-model"

            [audio]
            frame_samples = 2048
            "#,
        )
        .unwrap();

        assert_eq!(config.link.model, "test-live-model");
        assert_eq!(config.link.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.audio.frame_samples, 2048);
        assert_eq!(config.audio.output_gain, 1.2);
        assert_eq!(config.channel_buffer_size, 256);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(ParklinkConfig::from_toml_str("[audio]\nframe_samples = \"lots\"").is_err());
    }

    #[test]
    fn test_url_with_key() {
        let config = ParklinkConfig::new().with_api_key("secret");
        assert_eq!(config.link.url(), format!("{}?key=secret", DEFAULT_ENDPOINT));
        assert_eq!(LinkConfig::default().url(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let text = ParklinkConfig::new().with_api_key("secret").to_toml_string().unwrap();
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_validation() {
        assert!(ParklinkConfig::new().with_frame_samples(0).validate().is_err());
        assert!(ParklinkConfig::new().with_output_gain(-1.0).validate().is_err());

        let mut config = ParklinkConfig::new();
        config.link.endpoint = "http://example.com".into();
        assert!(config.validate().is_err());
    }
}
