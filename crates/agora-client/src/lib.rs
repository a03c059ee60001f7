//! # agora-client
//!
//! Client-side projection of the Agora conversation plane: the conversation
//! list, the active conversation, and its loaded messages, folded from the
//! stream of server events by a pure reducer.
//!
//! The crate performs no I/O. Network wiring lives with the embedding
//! application; [`sync`] translates wire events into reducer transitions and
//! names the fetches the application must issue.

pub mod state;
pub mod sync;

pub use state::{ChatEvent, ChatState, Conversation, Message};
