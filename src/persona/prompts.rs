//! Image prompts derived from personas and tool calls

use super::{AvatarMood, Contact};

pub fn avatar_prompt(contact: &Contact, mood: AvatarMood) -> String {
    format!(
        "{}. {}. Cinematic lighting, shallow depth of field, 4k resolution.",
        contact.description,
        mood.expression()
    )
}

/// Wrap a visual feed description into a full scene prompt
pub fn visual_feed_prompt(description: &str) -> String {
    format!(
        "A photorealistic, high-quality image of {} in a prehistoric jungle environment. Cinematic lighting, detailed textures.",
        description.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::contacts;

    #[test]
    fn test_avatar_prompt() {
        let contact = contacts::find("muldoon").unwrap();
        let prompt = avatar_prompt(contact, AvatarMood::Alert);
        assert!(prompt.starts_with(contact.description));
        assert!(prompt.contains(". concerned, serious, intense gaze, warning. "));
        assert!(prompt.ends_with("4k resolution."));
    }

    #[test]
    fn test_visual_feed_prompt() {
        assert_eq!(
            visual_feed_prompt(" a T-Rex roaring in the rain "),
            "A photorealistic, high-quality image of a T-Rex roaring in the rain in a prehistoric jungle environment. Cinematic lighting, detailed textures."
        );
    }
}
