//! Avatar mood, inferred from what the persona just said

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarMood {
    #[default]
    Listening,
    Speaking,
    Alert,
    Happy,
    Thinking,
    Angry,
    Surprised,
}

impl AvatarMood {
    /// Facial expression fragment for avatar prompts
    pub fn expression(&self) -> &'static str {
        match self {
            AvatarMood::Listening => "neutral, listening",
            AvatarMood::Speaking => "speaking, mouth slightly open, engaging expression",
            AvatarMood::Happy => "smiling, laughing, enthusiastic",
            AvatarMood::Alert => "concerned, serious, intense gaze, warning",
            AvatarMood::Thinking => "pensive, looking down, thoughtful",
            AvatarMood::Angry => "angry, frustrated, shouting",
            AvatarMood::Surprised => "shocked, eyes wide, surprised",
        }
    }
}

const ALERT_WORDS: [&str; 3] = ["dangerous", "warning", "run"];
const HAPPY_WORDS: [&str; 3] = ["great", "love", "wonderful"];
const THINKING_WORDS: [&str; 2] = ["hmm", "think"];

/// Pick a mood for a finished agent reply.
///
/// Plain substring matching, so "running" counts as alert and "thinking" as
/// thinking. Alert wins over happy, happy over thinking.
pub fn classify_mood(text: &str) -> AvatarMood {
    let lower = text.to_lowercase();
    let contains_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if contains_any(&ALERT_WORDS) {
        AvatarMood::Alert
    } else if contains_any(&HAPPY_WORDS) {
        AvatarMood::Happy
    } else if contains_any(&THINKING_WORDS) {
        AvatarMood::Thinking
    } else {
        AvatarMood::Speaking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        assert_eq!(classify_mood("I love it, but it's DANGEROUS"), AvatarMood::Alert);
        assert_eq!(classify_mood("Hmm, what a wonderful specimen"), AvatarMood::Happy);
        assert_eq!(classify_mood("Let me think about that."), AvatarMood::Thinking);
        assert_eq!(classify_mood("The fences are holding."), AvatarMood::Speaking);
    }

    #[test]
    fn test_substring_matches() {
        assert_eq!(classify_mood("They're running toward the gate"), AvatarMood::Alert);
    }

    #[test]
    fn test_default_is_listening() {
        assert_eq!(AvatarMood::default().expression(), "neutral, listening");
    }
}
