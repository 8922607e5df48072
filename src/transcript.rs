//! Streaming transcript accumulation
//!
//! The link streams speech-to-text for both sides of the call as small deltas.
//! Deltas are buffered per direction until the backend marks the turn complete,
//! then each non-empty buffer becomes one final transcript line.

use serde::{Deserialize, Serialize};

/// Which side of the call a transcript belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Speech captured from the microphone
    User,
    /// Speech produced by the persona
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub direction: Direction,
    pub text: String,
    pub is_final: bool,
}

impl TranscriptEvent {
    pub fn finalized(direction: Direction, text: String) -> Self {
        Self {
            direction,
            text,
            is_final: true,
        }
    }
}

/// Independent per-direction transcript buffers
#[derive(Debug, Default, Clone)]
pub struct TranscriptAccumulator {
    user: String,
    agent: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer_mut(&mut self, direction: Direction) -> &mut String {
        match direction {
            Direction::User => &mut self.user,
            Direction::Agent => &mut self.agent,
        }
    }

    pub fn buffer(&self, direction: Direction) -> &str {
        match direction {
            Direction::User => &self.user,
            Direction::Agent => &self.agent,
        }
    }

    /// Append a partial transcript in arrival order
    pub fn append_delta(&mut self, direction: Direction, text: &str) {
        if !text.is_empty() {
            self.buffer_mut(direction).push_str(text);
        }
    }

    /// Close the current turn.
    ///
    /// Emits user then agent lines; a buffer holding only whitespace emits
    /// nothing. Emitted buffers are cleared.
    pub fn finalize_turn(&mut self) -> Vec<TranscriptEvent> {
        let mut events = Vec::with_capacity(2);
        for direction in [Direction::User, Direction::Agent] {
            let buffer = self.buffer_mut(direction);
            if buffer.trim().is_empty() {
                continue;
            }
            events.push(TranscriptEvent::finalized(
                direction,
                std::mem::take(buffer),
            ));
        }
        events
    }

    /// Throw away one direction's in-progress text without emitting it
    pub fn discard(&mut self, direction: Direction) {
        self.buffer_mut(direction).clear();
    }

    pub fn reset(&mut self) {
        self.user.clear();
        self.agent.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.agent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_concatenate_per_direction() {
        let mut acc = TranscriptAccumulator::new();
        acc.append_delta(Direction::User, "Where are ");
        acc.append_delta(Direction::Agent, "Hold on");
        acc.append_delta(Direction::User, "the raptors?");

        assert_eq!(acc.buffer(Direction::User), "Where are the raptors?");
        assert_eq!(acc.buffer(Direction::Agent), "Hold on");
    }

    #[test]
    fn test_finalize_emits_one_line_per_direction() {
        let mut acc = TranscriptAccumulator::new();
        acc.append_delta(Direction::User, "Hello");
        acc.append_delta(Direction::Agent, " Welcome to the park.");

        let events = acc.finalize_turn();
        assert_eq!(
            events,
            vec![
                TranscriptEvent::finalized(Direction::User, "Hello".into()),
                TranscriptEvent::finalized(Direction::Agent, " Welcome to the park.".into()),
            ]
        );
        assert!(acc.is_empty());
    }

    #[test]
    fn test_finalize_with_nothing_emits_nothing() {
        let mut acc = TranscriptAccumulator::new();
        assert!(acc.finalize_turn().is_empty());

        acc.append_delta(Direction::Agent, "   ");
        assert!(acc.finalize_turn().is_empty());
        // whitespace is kept until real text or a discard arrives
        assert_eq!(acc.buffer(Direction::Agent), "   ");
    }

    #[test]
    fn test_discard_only_touches_one_direction() {
        let mut acc = TranscriptAccumulator::new();
        acc.append_delta(Direction::User, "Is it safe");
        acc.append_delta(Direction::Agent, "Absolutely, we spared");

        acc.discard(Direction::Agent);

        assert_eq!(acc.buffer(Direction::Agent), "");
        let events = acc.finalize_turn();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, Direction::User);
    }
}
