//! Park staff personas the user can call

pub mod contacts;
pub mod mood;
pub mod prompts;

pub use contacts::PARK_CONTACTS;
pub use mood::{classify_mood, AvatarMood};
pub use prompts::{avatar_prompt, visual_feed_prompt};

use serde::Serialize;
use std::fmt;

/// Prebuilt voices offered by the live backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Voice {
    Puck,
    Charon,
    Kore,
    Fenrir,
    Aoede,
}

impl Voice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Puck => "Puck",
            Voice::Charon => "Charon",
            Voice::Kore => "Kore",
            Voice::Fenrir => "Fenrir",
            Voice::Aoede => "Aoede",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persona: who answers the call and how they sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub id: &'static str,
    pub name: &'static str,
    pub role: &'static str,
    /// Visual description, used for avatar generation
    pub description: &'static str,
    pub voice: Voice,
    pub system_instruction: &'static str,
    pub avatar_query: &'static str,
    pub theme_color: &'static str,
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.role)
    }
}
