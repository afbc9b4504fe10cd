use log::{ debug, error };

use super::state::ChatState;
use super::transport::ChatTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing was sent: blank input, or a turn was already pending.
    Ignored,
    Replied,
    Failed(String),
}

/// Drives `ChatState` through one network round trip per submitted message.
pub struct ChatSession<T: ChatTransport> {
    state: ChatState,
    transport: T,
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(state: ChatState, transport: T) -> Self {
        Self { state, transport }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ChatState {
        &mut self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn submit(&mut self, input: impl Into<String>) -> TurnOutcome {
        self.state.set_input(input);
        let Some(turn) = self.state.submit() else {
            return TurnOutcome::Ignored;
        };

        debug!("Sending turn to {} (history {})", turn.provider, turn.history.len());
        match self.transport.send(&turn).await {
            Ok(reply) => {
                self.state.resolve(Ok(reply));
                TurnOutcome::Replied
            }
            Err(e) => {
                let message = e.to_string();
                error!("Error sending message: {}", message);
                self.state.resolve(Err(message.clone()));
                TurnOutcome::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::state::{ PendingTurn, Phase, Reply };
    use crate::client::transport::TransportError;
    use crate::llm::{ ProviderKind, Role };
    use async_trait::async_trait;
    use chrono::{ DateTime, Utc };
    use std::sync::Mutex;

    struct ScriptedTransport {
        replies: Mutex<Vec<Result<Reply, TransportError>>>,
        sent: Mutex<Vec<PendingTurn>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<Reply, TransportError>>) -> Self {
            Self { replies: Mutex::new(replies), sent: Mutex::new(Vec::new()) }
        }

        fn sent(&self) -> Vec<PendingTurn> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, turn: &PendingTurn) -> Result<Reply, TransportError> {
            self.sent.lock().unwrap().push(turn.clone());
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn reply_at(text: &str, ts: &str) -> Reply {
        Reply {
            message: text.into(),
            timestamp: DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
        }
    }

    #[tokio::test]
    async fn two_plus_two_round_trip() {
        let transport = ScriptedTransport::new(vec![Ok(reply_at("4", "2024-05-01T12:00:00.000Z"))]);
        let mut session = ChatSession::new(ChatState::new(ProviderKind::OpenAI), transport);

        assert_eq!(session.submit("What is 2+2?").await, TurnOutcome::Replied);

        let messages = session.state().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "What is 2+2?");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "4");
        assert_eq!(messages[1].timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
        assert_eq!(session.state().phase(), Phase::Idle);

        let sent = session.transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].provider, ProviderKind::OpenAI);
        assert!(sent[0].history.is_empty());
    }

    #[tokio::test]
    async fn failure_shows_in_banner_and_log() {
        let transport = ScriptedTransport::new(
            vec![Err(TransportError::Server("Invalid API key".into()))]
        );
        let mut session = ChatSession::new(ChatState::new(ProviderKind::Gemini), transport);

        let outcome = session.submit("hello").await;
        assert_eq!(outcome, TurnOutcome::Failed("Invalid API key".into()));
        assert_eq!(session.state().error(), Some("Invalid API key"));
        assert_eq!(
            session.state().messages()[1].content,
            "Sorry, I encountered an error: Invalid API key"
        );
    }

    #[tokio::test]
    async fn submit_while_pending_sends_nothing() {
        let transport = ScriptedTransport::new(vec![]);
        let mut session = ChatSession::new(ChatState::new(ProviderKind::Gemini), transport);

        session.state_mut().set_input("in flight");
        assert!(session.state_mut().submit().is_some());

        assert_eq!(session.submit("again").await, TurnOutcome::Ignored);
        assert!(session.transport().sent().is_empty());
        assert_eq!(session.state().messages().len(), 1);
    }

    #[tokio::test]
    async fn blank_input_sends_nothing() {
        let transport = ScriptedTransport::new(vec![]);
        let mut session = ChatSession::new(ChatState::new(ProviderKind::Gemini), transport);
        assert_eq!(session.submit("   ").await, TurnOutcome::Ignored);
        assert!(session.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn history_grows_with_each_turn() {
        let transport = ScriptedTransport::new(
            vec![
                Ok(reply_at("a1", "2024-05-01T12:00:00Z")),
                Ok(reply_at("a2", "2024-05-01T12:00:05Z"))
            ]
        );
        let mut session = ChatSession::new(ChatState::new(ProviderKind::Gemini), transport);
        session.submit("q1").await;
        session.submit("q2").await;

        let sent = session.transport().sent();
        assert_eq!(sent[1].history.len(), 2);
        assert_eq!(sent[1].history[1].content, "a1");
        assert_eq!(session.state().messages().len(), 4);
    }
}
