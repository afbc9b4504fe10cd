//! Per-session UI state and the Idle/Pending transitions of one chat turn.

use chrono::{ DateTime, Utc };
use log::{ debug, warn };

use super::store::{ ConversationStore, Message, MessageIds };
use crate::llm::{ ProviderKind, Role, Turn };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending,
}

/// The outbound call a successful submit asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub provider: ProviderKind,
    pub message: String,
    pub history: Vec<Turn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub fn error_reply_text(error: &str) -> String {
    format!("Sorry, I encountered an error: {}", error)
}

#[derive(Debug, Clone)]
pub struct ChatState {
    store: ConversationStore,
    ids: MessageIds,
    input: String,
    phase: Phase,
    error: Option<String>,
    provider: ProviderKind,
    show_settings: bool,
}

impl ChatState {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            store: ConversationStore::new(),
            ids: MessageIds::default(),
            input: String::new(),
            phase: Phase::Idle,
            error: None,
            provider,
            show_settings: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.store.all()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Pending
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn show_settings(&self) -> bool {
        self.show_settings
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Idle → Pending. Returns `None` (and changes nothing) while a turn is
    /// outstanding or when the trimmed input is empty.
    ///
    /// The history carried by the returned turn is the log as it stood before
    /// the new user message was appended; the server trims it.
    pub fn submit(&mut self) -> Option<PendingTurn> {
        if self.phase == Phase::Pending {
            debug!("Submit ignored: a turn is already pending");
            return None;
        }
        let content = self.input.trim();
        if content.is_empty() {
            return None;
        }
        let content = content.to_string();

        let history = self.store.turns();
        let now = Utc::now();
        let id = self.ids.next(now);
        self.store.append(Message::new(id, Role::User, content.clone(), now));
        self.input.clear();
        self.error = None;
        self.phase = Phase::Pending;

        Some(PendingTurn { provider: self.provider, message: content, history })
    }

    /// Pending → Idle. A failure is both kept for the banner and appended as
    /// an assistant message. Returns `false` if no turn was pending.
    pub fn resolve(&mut self, outcome: Result<Reply, String>) -> bool {
        if self.phase != Phase::Pending {
            warn!("Dropping reply that arrived with no pending turn");
            return false;
        }
        match outcome {
            Ok(reply) => {
                let id = self.ids.next(Utc::now());
                self.store.append(Message::new(id, Role::Assistant, reply.message, reply.timestamp));
            }
            Err(error) => {
                let now = Utc::now();
                let id = self.ids.next(now);
                self.store.append(Message::new(id, Role::Assistant, error_reply_text(&error), now));
                self.error = Some(error);
            }
        }
        self.phase = Phase::Idle;
        true
    }

    /// Empties the log and the error banner.
    pub fn clear(&mut self) {
        self.store.clear();
        self.error = None;
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn select_provider(&mut self, provider: ProviderKind) {
        self.provider = provider;
    }

    pub fn toggle_settings(&mut self) -> bool {
        self.show_settings = !self.show_settings;
        self.show_settings
    }
}
