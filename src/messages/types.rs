use crate::persona::Contact;
use crate::transcript::{Direction, TranscriptEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
    System,
}

impl From<Direction> for Sender {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::User => Sender::User,
            Direction::Agent => Sender::Agent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
            is_error: false,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Sender::System, format!("[SYSTEM]: {}", text.into()))
    }

    pub fn system_error(text: impl Into<String>) -> Self {
        let mut message = Self::new(Sender::System, format!("[SYSTEM ERROR]: {}", text.into()));
        message.is_error = true;
        message
    }

    /// Greeting shown when a contact's conversation is first opened
    pub fn welcome(contact: &Contact) -> Self {
        Self::new(
            Sender::Agent,
            format!("This is {}. {}. How can I help you?", contact.name, contact.role),
        )
    }

    pub fn calling(contact: &Contact) -> Self {
        Self::system(format!("Calling {}...", contact.name))
    }

    pub fn uplink_terminated() -> Self {
        Self::system("Voice uplink terminated.")
    }

    pub fn visual_received(subject: &str) -> Self {
        Self::system(format!(
            "Visual data received for subject \"{}\". Displaying on Visual Feed.",
            subject
        ))
    }
}

impl From<&TranscriptEvent> for Message {
    fn from(event: &TranscriptEvent) -> Self {
        Self::new(event.direction.into(), event.text.clone())
    }
}
