//! Conversation state and the reducer that maintains it.
//!
//! [`ChatState`] is only ever changed through [`ChatState::apply`], which
//! consumes the state and an event and returns the successor state. Every
//! transition is total: unmatched ids and unknown conversations degrade to
//! no-ops, never to errors. The single structural invariant is that the
//! conversation list stays sorted descending by `updated_at` after every
//! mutation that touches it.

use agora_shared::protocol::AttachmentMeta;
use agora_shared::types::{Author, ConversationId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the inbox / conversation list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    /// Display name of the other party.
    pub title: String,
    /// Last message's content, empty when the latest message was redacted.
    pub last_message: String,
    pub updated_at: DateTime<Utc>,
    /// Maintained by the notification layer; the reducer only carries it.
    pub unread_count: u32,
}

/// A loaded message of the active conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub author: Author,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentMeta>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub deleted: bool,
}

impl Message {
    /// Content as it should be rendered; redacted messages show nothing.
    pub fn display_content(&self) -> &str {
        if self.deleted {
            ""
        } else {
            &self.content
        }
    }
}

/// The discrete transitions the reducer understands.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Replace the active conversation and discard loaded messages. The
    /// caller is responsible for fetching the new conversation's history.
    SetActiveConversation(Option<Conversation>),
    /// Replace the whole conversation list (initial fetch). The input is
    /// assumed pre-sorted by the data source; no reordering is performed.
    ReplaceConversationList(Vec<Conversation>),
    /// Replace the loaded messages of the active conversation.
    ReplaceMessageList(Vec<Message>),
    /// A message arrived for the conversation that is currently open.
    AppendIncomingMessage(Message),
    /// A message arrived for a conversation that is not open; only the
    /// inbox preview updates, history is never loaded here.
    AppendIncomingInactive(Message),
    /// Mark every loaded message as read.
    MarkAllRead,
    /// Flag a loaded message as deleted.
    SoftDeleteMessage(MessageId),
}

/// In-memory projection of the conversation plane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    /// Inbox entries, sorted descending by `updated_at`.
    pub conversations: Vec<Conversation>,
    /// The conversation whose history is loaded, if any.
    pub active: Option<Conversation>,
    /// Loaded messages of the active conversation, in arrival order.
    pub messages: Vec<Message>,
}

impl ChatState {
    /// Fold one event into the state. Pure: no I/O, no side effects.
    pub fn apply(mut self, event: ChatEvent) -> Self {
        match event {
            ChatEvent::SetActiveConversation(conversation) => {
                self.active = conversation;
                self.messages.clear();
            }

            ChatEvent::ReplaceConversationList(conversations) => {
                self.conversations = conversations;
            }

            ChatEvent::ReplaceMessageList(messages) => {
                self.messages = messages;
            }

            ChatEvent::AppendIncomingMessage(message) => {
                // Redelivery guard: message ids are server-allocated, so an
                // id we already hold means a duplicate frame, not new state.
                if self.messages.iter().any(|m| m.id == message.id) {
                    return self;
                }
                self.bump_conversation(&message);
                if self
                    .active
                    .as_ref()
                    .is_some_and(|c| c.id == message.conversation_id)
                {
                    self.messages.push(message);
                }
                self.sort_conversations();
            }

            ChatEvent::AppendIncomingInactive(message) => {
                self.bump_conversation(&message);
                self.sort_conversations();
            }

            ChatEvent::MarkAllRead => {
                for message in &mut self.messages {
                    message.read = true;
                }
            }

            ChatEvent::SoftDeleteMessage(id) => {
                let was_newest = self.messages.last().is_some_and(|m| m.id == id);
                let Some(message) = self.messages.iter_mut().find(|m| m.id == id) else {
                    // The message may belong to a conversation that is not
                    // loaded; nothing to do.
                    tracing::debug!(message = %id, "soft delete for a message that is not loaded");
                    return self;
                };
                message.deleted = true;
                let conversation_id = message.conversation_id;

                if was_newest {
                    if let Some(conversation) = self
                        .conversations
                        .iter_mut()
                        .find(|c| c.id == conversation_id)
                    {
                        conversation.last_message.clear();
                    }
                }
                self.sort_conversations();
            }
        }
        self
    }

    /// Update the matching inbox entry's preview and timestamp. Unknown
    /// conversations leave the list untouched.
    fn bump_conversation(&mut self, message: &Message) {
        if let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
        {
            conversation.last_message = message.display_content().to_string();
            conversation.updated_at = message.created_at;
        }
    }

    fn sort_conversations(&mut self) {
        self.conversations
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_shared::types::UserId;
    use chrono::Duration;
    use uuid::Uuid;

    fn conversation(title: &str, at: DateTime<Utc>) -> Conversation {
        Conversation {
            id: ConversationId(Uuid::new_v4()),
            title: title.to_string(),
            last_message: String::new(),
            updated_at: at,
            unread_count: 0,
        }
    }

    fn message(conversation_id: ConversationId, content: &str, at: DateTime<Utc>) -> Message {
        Message {
            id: MessageId(Uuid::new_v4()),
            conversation_id,
            author: Author {
                id: UserId::new(),
                username: "ada".to_string(),
                display_name: None,
                avatar_url: None,
            },
            content: content.to_string(),
            attachment: None,
            created_at: at,
            read: false,
            deleted: false,
        }
    }

    fn is_sorted_desc(state: &ChatState) -> bool {
        state
            .conversations
            .windows(2)
            .all(|w| w[0].updated_at >= w[1].updated_at)
    }

    fn seeded_state() -> (ChatState, Conversation, Conversation) {
        let now = Utc::now();
        let first = conversation("first", now);
        let second = conversation("second", now - Duration::hours(1));
        let state = ChatState::default().apply(ChatEvent::ReplaceConversationList(vec![
            first.clone(),
            second.clone(),
        ]));
        (state, first, second)
    }

    #[test]
    fn conversations_stay_sorted_under_append_sequences() {
        let (mut state, first, second) = seeded_state();
        let now = Utc::now();

        // Bounce activity between the two conversations and a stranger.
        let events = [
            ChatEvent::AppendIncomingInactive(message(second.id, "a", now + Duration::seconds(1))),
            ChatEvent::AppendIncomingInactive(message(first.id, "b", now + Duration::seconds(2))),
            ChatEvent::AppendIncomingInactive(message(
                ConversationId(Uuid::new_v4()),
                "stranger",
                now + Duration::seconds(3),
            )),
            ChatEvent::AppendIncomingInactive(message(second.id, "c", now + Duration::seconds(4))),
        ];

        for event in events {
            state = state.apply(event);
            assert!(is_sorted_desc(&state));
        }

        assert_eq!(state.conversations[0].title, "second");
        assert_eq!(state.conversations[0].last_message, "c");
    }

    #[test]
    fn switching_conversation_discards_messages() {
        let (state, first, second) = seeded_state();
        let state = state.apply(ChatEvent::SetActiveConversation(Some(first.clone())));
        let state = state.apply(ChatEvent::AppendIncomingMessage(message(
            first.id,
            "hello",
            Utc::now(),
        )));
        assert_eq!(state.messages.len(), 1);

        let state = state.apply(ChatEvent::SetActiveConversation(Some(second)));
        assert!(state.messages.is_empty());

        // Switching to no conversation at all behaves the same.
        let state = state.apply(ChatEvent::SetActiveConversation(None));
        assert!(state.messages.is_empty());
        assert!(state.active.is_none());
    }

    #[test]
    fn append_for_active_updates_preview_and_tail() {
        let (state, first, _) = seeded_state();
        let state = state.apply(ChatEvent::SetActiveConversation(Some(first.clone())));
        let at = Utc::now() + Duration::seconds(10);
        let state = state.apply(ChatEvent::AppendIncomingMessage(message(first.id, "hi", at)));

        assert_eq!(state.messages.last().unwrap().content, "hi");
        let entry = state
            .conversations
            .iter()
            .find(|c| c.id == first.id)
            .unwrap();
        assert_eq!(entry.last_message, "hi");
        assert_eq!(entry.updated_at, at);
        assert_eq!(state.conversations[0].id, first.id);
    }

    #[test]
    fn append_for_unknown_conversation_is_ordering_noop() {
        let (state, _, _) = seeded_state();
        let before = state.conversations.clone();
        let state = state.apply(ChatEvent::AppendIncomingMessage(message(
            ConversationId(Uuid::new_v4()),
            "ghost",
            Utc::now(),
        )));
        assert_eq!(state.conversations, before);
        assert!(state.messages.is_empty());
    }

    #[test]
    fn duplicate_delivery_is_ignored() {
        let (state, first, _) = seeded_state();
        let state = state.apply(ChatEvent::SetActiveConversation(Some(first.clone())));
        let incoming = message(first.id, "once", Utc::now());

        let state = state.apply(ChatEvent::AppendIncomingMessage(incoming.clone()));
        let state = state.apply(ChatEvent::AppendIncomingMessage(incoming));
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn inactive_append_never_touches_messages() {
        let (state, first, second) = seeded_state();
        let state = state.apply(ChatEvent::SetActiveConversation(Some(first)));
        let state = state.apply(ChatEvent::AppendIncomingInactive(message(
            second.id,
            "psst",
            Utc::now() + Duration::seconds(1),
        )));

        assert!(state.messages.is_empty());
        assert_eq!(state.conversations[0].id, second.id);
        assert_eq!(state.conversations[0].last_message, "psst");
    }

    #[test]
    fn mark_all_read_is_idempotent() {
        let (state, first, _) = seeded_state();
        let state = state.apply(ChatEvent::SetActiveConversation(Some(first.clone())));
        let now = Utc::now();
        let state = state
            .apply(ChatEvent::AppendIncomingMessage(message(first.id, "a", now)))
            .apply(ChatEvent::AppendIncomingMessage(message(
                first.id,
                "b",
                now + Duration::seconds(1),
            )));

        let once = state.apply(ChatEvent::MarkAllRead);
        assert!(once.messages.iter().all(|m| m.read));

        let twice = once.clone().apply(ChatEvent::MarkAllRead);
        assert_eq!(once, twice);
    }

    #[test]
    fn soft_delete_unknown_id_leaves_state_unchanged() {
        let (state, first, _) = seeded_state();
        let state = state.apply(ChatEvent::SetActiveConversation(Some(first.clone())));
        let state = state.apply(ChatEvent::AppendIncomingMessage(message(
            first.id,
            "keep",
            Utc::now(),
        )));

        let before = state.clone();
        let after = state.apply(ChatEvent::SoftDeleteMessage(MessageId(Uuid::new_v4())));
        assert_eq!(before, after);
    }

    #[test]
    fn deleting_newest_clears_preview_deleting_older_does_not() {
        let (state, first, _) = seeded_state();
        let state = state.apply(ChatEvent::SetActiveConversation(Some(first.clone())));
        let now = Utc::now();
        let older = message(first.id, "older", now);
        let newest = message(first.id, "newest", now + Duration::seconds(1));
        let state = state
            .apply(ChatEvent::AppendIncomingMessage(older.clone()))
            .apply(ChatEvent::AppendIncomingMessage(newest.clone()));

        let state = state.apply(ChatEvent::SoftDeleteMessage(older.id));
        let entry = state
            .conversations
            .iter()
            .find(|c| c.id == first.id)
            .unwrap();
        assert_eq!(entry.last_message, "newest");
        assert_eq!(state.messages[0].display_content(), "");

        let state = state.apply(ChatEvent::SoftDeleteMessage(newest.id));
        let entry = state
            .conversations
            .iter()
            .find(|c| c.id == first.id)
            .unwrap();
        assert_eq!(entry.last_message, "");
    }
}
