//! The bidirectional voice link to the generative backend

pub mod protocol;
pub mod ws;

pub use protocol::{
    Blob, ClientMessage, FunctionCall, FunctionDeclaration, FunctionResponse, ServerMessage,
};
pub use ws::WsConnector;

use crate::config::LinkConfig;
use crate::persona::Contact;
use crate::Result;
use protocol::{
    AudioTranscriptionConfig, Content, GenerationConfig, PrebuiltVoiceConfig, Setup, SpeechConfig,
    Tool, VoiceConfig,
};
use std::sync::Arc;

/// Something that happened on the link
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Setup acknowledged; audio may flow
    Opened,
    /// A message from the backend
    Message(Box<ServerMessage>),
    /// The link failed
    Error(String),
    /// The link closed, with the close reason if one was given
    Closed(Option<String>),
}

/// Delivers link events into the session's inbound queue
pub type LinkEventCallback = Arc<dyn Fn(LinkEvent) + Send + Sync>;

/// Everything needed to open a link for one persona
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    pub model: String,
    pub voice_name: String,
    pub instruction: String,
    pub tools: Vec<FunctionDeclaration>,
}

impl SessionParams {
    /// Bind a persona to the link configuration, with the given tools
    pub fn for_contact(
        link: &LinkConfig,
        contact: &Contact,
        tools: Vec<FunctionDeclaration>,
    ) -> Self {
        Self {
            model: link.model.clone(),
            voice_name: contact.voice.as_str().to_string(),
            instruction: contact.system_instruction.to_string(),
            tools,
        }
    }

    /// The setup message that opens the session
    pub fn setup_message(&self) -> ClientMessage {
        let model = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };

        ClientMessage::Setup(Setup {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.voice_name.clone(),
                        },
                    },
                },
            },
            system_instruction: Content::text(self.instruction.clone()),
            input_audio_transcription: AudioTranscriptionConfig::default(),
            output_audio_transcription: AudioTranscriptionConfig::default(),
            tools: if self.tools.is_empty() {
                Vec::new()
            } else {
                vec![Tool {
                    function_declarations: self.tools.clone(),
                }]
            },
        })
    }
}

/// An open link owned by one session
pub trait Link {
    /// Queue a message for the backend
    fn send(&mut self, message: ClientMessage) -> Result<()>;

    /// Close the link; may fail if it is already gone
    fn close(&mut self) -> Result<()>;
}

/// Opens links. `connect` returns at once; readiness arrives as
/// [`LinkEvent::Opened`] through `on_event`.
pub trait LinkConnector: Send {
    fn connect(&self, params: &SessionParams, on_event: LinkEventCallback) -> Result<Box<dyn Link>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::contacts;
    use crate::tools::visual_feed_declaration;
    use serde_json::{json, Value};

    #[test]
    fn test_setup_message_shape() {
        let contact = contacts::find("grant").unwrap();
        let params = SessionParams::for_contact(
            &LinkConfig::default(),
            contact,
            vec![visual_feed_declaration()],
        );

        let value: Value = serde_json::from_str(&params.setup_message().to_json().unwrap()).unwrap();
        let setup = &value["setup"];

        assert!(setup["model"].as_str().unwrap().starts_with("models/"));
        assert_eq!(setup["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
        assert_eq!(setup["inputAudioTranscription"], json!({}));
        assert_eq!(setup["outputAudioTranscription"], json!({}));
        assert!(setup["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Alan Grant"));
        assert_eq!(
            setup["tools"][0]["functionDeclarations"][0]["name"],
            "update_visual_feed"
        );
        assert_eq!(
            setup["tools"][0]["functionDeclarations"][0]["parameters"]["required"],
            json!(["description"])
        );
    }
}
