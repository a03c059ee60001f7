//! Adapter between the wire protocol and the reducer.
//!
//! The reducer knows nothing about sockets; this module is the only place
//! that looks at [`ServerEvent`]s. It stays pure as well: translation
//! returns the transitions to apply plus the [`Command`]s the embedding
//! application must execute (HTTP fetches), without performing either.

use agora_shared::protocol::{ChatMessage, ServerEvent};
use agora_shared::types::ConversationId;

use crate::state::{ChatEvent, ChatState, Conversation, Message};

/// Side effects the application owes after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reload the conversation list (feeds `ReplaceConversationList`).
    FetchConversations,
    /// Load a conversation's history (feeds `ReplaceMessageList`).
    FetchMessages(ConversationId),
}

/// Translate a server event into reducer transitions.
///
/// Post, deletion and like events belong to the feed plane and produce no
/// conversation transitions; every event kind is still matched explicitly
/// so a new variant fails to compile rather than silently falling through.
pub fn transitions_for(state: &ChatState, event: &ServerEvent) -> Vec<ChatEvent> {
    match event {
        ServerEvent::Message(message) => {
            let incoming = from_wire(message);
            if state
                .active
                .as_ref()
                .is_some_and(|c| c.id == incoming.conversation_id)
            {
                vec![ChatEvent::AppendIncomingMessage(incoming)]
            } else {
                vec![ChatEvent::AppendIncomingInactive(incoming)]
            }
        }
        ServerEvent::Post(_)
        | ServerEvent::DeletePost(_)
        | ServerEvent::Like(_)
        | ServerEvent::Error { .. } => Vec::new(),
    }
}

/// Open a conversation (or close the pane with `None`).
///
/// Returns the transition plus the history fetch the caller must issue;
/// the reducer itself discards stale messages and loads nothing.
pub fn select_conversation(
    conversation: Option<Conversation>,
) -> (ChatEvent, Option<Command>) {
    let fetch = conversation
        .as_ref()
        .map(|c| Command::FetchMessages(c.id));
    (ChatEvent::SetActiveConversation(conversation), fetch)
}

/// Project a wire message onto the client view model.
fn from_wire(message: &ChatMessage) -> Message {
    Message {
        id: message.id,
        conversation_id: message.conversation_id,
        author: message.author.clone(),
        content: message.content.clone(),
        attachment: message.attachment.clone(),
        created_at: message.created_at,
        read: false,
        deleted: false,
    }
}
