use super::types::{Message, Sender};
use crate::persona::Contact;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory conversation history, one thread per contact
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    threads: Arc<RwLock<HashMap<String, Vec<Message>>>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, contact_id: &str, message: Message) {
        self.threads
            .write()
            .entry(contact_id.to_string())
            .or_default()
            .push(message);
    }

    /// Seed a contact's thread with their greeting if it is empty.
    /// Returns true if the greeting was added.
    pub fn open(&self, contact: &Contact) -> bool {
        let mut threads = self.threads.write();
        let thread = threads.entry(contact.id.to_string()).or_default();
        if thread.is_empty() {
            thread.push(Message::welcome(contact));
            true
        } else {
            false
        }
    }

    pub fn get_all(&self, contact_id: &str) -> Vec<Message> {
        self.threads
            .read()
            .get(contact_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Most recent message from the given sender
    pub fn last_from(&self, contact_id: &str, sender: Sender) -> Option<Message> {
        self.threads
            .read()
            .get(contact_id)?
            .iter()
            .rev()
            .find(|m| m.sender == sender)
            .cloned()
    }

    pub fn clear(&self, contact_id: &str) {
        self.threads.write().remove(contact_id);
    }

    pub fn len(&self, contact_id: &str) -> usize {
        self.threads.read().get(contact_id).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.threads.read().values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::contacts;
    use crate::transcript::{Direction, TranscriptEvent};

    #[test]
    fn test_open_seeds_greeting_once() {
        let log = ConversationLog::new();
        let grant = contacts::find("grant").unwrap();

        assert!(log.open(grant));
        assert!(!log.open(grant));
        let thread = log.get_all("grant");
        assert_eq!(thread.len(), 1);
        assert_eq!(
            thread[0].text,
            "This is Dr. Alan Grant. Senior Paleontologist. How can I help you?"
        );
    }

    #[test]
    fn test_threads_are_per_contact() {
        let log = ConversationLog::new();
        log.add("grant", Message::calling(contacts::find("grant").unwrap()));
        log.add(
            "nedry",
            Message::from(&TranscriptEvent::finalized(Direction::User, "Magic word?".into())),
        );

        assert_eq!(log.len("grant"), 1);
        assert_eq!(log.len("nedry"), 1);
        assert_eq!(log.get_all("grant")[0].text, "[SYSTEM]: Calling Dr. Alan Grant...");
        assert_eq!(log.last_from("nedry", Sender::User).unwrap().text, "Magic word?");
        assert!(log.last_from("nedry", Sender::Agent).is_none());
    }

    #[test]
    fn test_error_notice() {
        let log = ConversationLog::new();
        log.add("muldoon", Message::system_error("Link disrupted (Service Unavailable)."));
        let message = &log.get_all("muldoon")[0];
        assert!(message.is_error);
        assert_eq!(message.sender, Sender::System);
        assert!(message.text.starts_with("[SYSTEM ERROR]: "));

        log.clear("muldoon");
        assert!(log.is_empty());
    }
}
