pub mod audio;
pub mod config;
pub mod link;
pub mod messages;
pub mod persona;
pub mod session;
pub mod tools;
pub mod transcript;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ParklinkError {
    #[error("Acquisition error: {0}")]
    AcquisitionError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Malformed audio: {0}")]
    MalformedAudioError(String),

    #[error("Invalid payload: {0}")]
    InvalidPayloadError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),
}

impl From<std::io::Error> for ParklinkError {
    fn from(e: std::io::Error) -> Self {
        ParklinkError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for ParklinkError {
    fn from(e: serde_json::Error) -> Self {
        ParklinkError::ProtocolError(e.to_string())
    }
}

impl ParklinkError {
    /// Check if this error is recoverable without tearing down the session
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Microphone or clock could not be opened
            ParklinkError::AcquisitionError(_) => false,
            // The link is gone; the caller decides whether to start again
            ParklinkError::TransportError(_) => false,
            // A single bad chunk is data loss, not session loss
            ParklinkError::MalformedAudioError(_) => true,
            ParklinkError::InvalidPayloadError(_) => true,
            ParklinkError::ProtocolError(_) => true,
            ParklinkError::ConfigError(_) => false,
            ParklinkError::ChannelError(_) => false,
            ParklinkError::IOError(_) => false,
            ParklinkError::AudioProcessingError(_) => true,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ParklinkError::AcquisitionError(_) => "Could not initialize voice uplink.".to_string(),
            ParklinkError::TransportError(_) => "Link disrupted (Service Unavailable).".to_string(),
            ParklinkError::MalformedAudioError(_) | ParklinkError::InvalidPayloadError(_) => {
                "Received garbled audio from the link.".to_string()
            }
            ParklinkError::ProtocolError(_) => {
                "Unexpected message on the voice link.".to_string()
            }
            ParklinkError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            ParklinkError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            ParklinkError::IOError(_) => "File system error occurred.".to_string(),
            ParklinkError::AudioProcessingError(_) => {
                "Audio processing failed. Please try again.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ParklinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_fatal_errors_are_not_recoverable() {
        assert!(!ParklinkError::AcquisitionError("mic".into()).is_recoverable());
        assert!(!ParklinkError::TransportError("503".into()).is_recoverable());
        assert!(ParklinkError::MalformedAudioError("channels".into()).is_recoverable());
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ParklinkError::TransportError("socket reset".into()).user_message(),
            "Link disrupted (Service Unavailable)."
        );
        assert_eq!(
            ParklinkError::AcquisitionError("no device".into()).user_message(),
            "Could not initialize voice uplink."
        );
    }
}
