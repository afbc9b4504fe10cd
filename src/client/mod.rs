//! Client side of the chat: the conversation log, the per-turn state machine
//! and the HTTP transport that talks to the bridge.

pub mod repl;
pub mod session;
pub mod state;
pub mod store;
pub mod transport;

pub use session::{ ChatSession, TurnOutcome };
pub use state::{ ChatState, PendingTurn, Phase, Reply };
pub use store::{ ConversationStore, Message };
pub use transport::{ ChatTransport, HttpTransport, TransportError };
