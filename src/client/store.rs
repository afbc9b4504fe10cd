use chrono::{ DateTime, Utc };
use serde::Serialize;

use crate::llm::{ Role, Turn };

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>
    ) -> Self {
        Self { id: id.into(), role, content: content.into(), timestamp }
    }

    pub fn to_turn(&self) -> Turn {
        Turn::new(self.role, self.content.clone())
    }
}

/// Append-only, chronologically ordered message log.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Wire form of the whole log, oldest first.
    pub fn turns(&self) -> Vec<Turn> {
        self.messages.iter().map(Message::to_turn).collect()
    }
}

/// Millisecond-based ids that never repeat or go backwards within one session.
#[derive(Debug, Clone, Default)]
pub struct MessageIds {
    last: i64,
}

impl MessageIds {
    pub fn next(&mut self, now: DateTime<Utc>) -> String {
        let candidate = now.timestamp_millis();
        self.last = if candidate > self.last { candidate } else { self.last + 1 };
        self.last.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order_and_clear_empties() {
        let now = Utc::now();
        let mut store = ConversationStore::new();
        store.append(Message::new("1", Role::User, "hi", now));
        store.append(Message::new("2", Role::Assistant, "hello", now));

        let contents: Vec<&str> = store.all().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["hi", "hello"]);
        assert_eq!(store.turns(), vec![Turn::user("hi"), Turn::assistant("hello")]);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn ids_are_strictly_increasing_for_same_instant() {
        let now = Utc::now();
        let mut ids = MessageIds::default();
        let a: i64 = ids.next(now).parse().unwrap();
        let b: i64 = ids.next(now).parse().unwrap();
        let c: i64 = ids.next(now - chrono::Duration::seconds(5)).parse().unwrap();
        assert!(a < b && b < c);
    }
}
