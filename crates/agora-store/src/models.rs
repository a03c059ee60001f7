//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the API layer.

use agora_shared::media::MediaCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A known user. Rows are upserted from the author object carried by every
/// creation event, so display data is always as fresh as the last thing the
/// user did.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Login name, unique per deployment.
    pub username: String,
    /// Optional human-readable display name.
    pub display_name: Option<String>,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
    /// Timestamp when this user was first seen locally.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A feed entry. Content is stored trimmed; it may be empty when the post
/// carries at least one attachment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    /// Unique post identifier, allocated before persistence so attachment
    /// URLs can reference the final storage path.
    pub id: Uuid,
    /// The posting user.
    pub author_id: Uuid,
    /// Trimmed textual content.
    pub content: String,
    /// When the post was created.
    pub created_at: DateTime<Utc>,
}

/// A stored attachment belonging to a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    /// Owning post.
    pub post_id: Uuid,
    /// Position within the post, 0-based. Doubles as the on-disk file stem.
    pub ordinal: u32,
    /// Resolved media category.
    pub kind: MediaCategory,
    /// Public URL of the stored file.
    pub url: String,
}

/// A post joined with its author and attachments, as served to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub post: Post,
    pub author: User,
    pub attachments: Vec<Attachment>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A two-party messaging thread. Created implicitly by the first message
/// between a pair of users; never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    /// Unique conversation identifier.
    pub id: Uuid,
    /// First participant (canonical order: `participant_a <= participant_b`).
    pub participant_a: Uuid,
    /// Second participant.
    pub participant_b: Uuid,
    /// Last message's content, shown as the inbox preview. Empty when the
    /// latest message was redacted.
    pub last_message: String,
    /// Timestamp of the latest message.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single direct message. Mutated only by soft delete: the row survives
/// with its id and conversation linkage, the content is redacted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier.
    pub id: Uuid,
    /// The conversation this message belongs to.
    pub conversation_id: Uuid,
    /// Sending user.
    pub sender_id: Uuid,
    /// Textual content; empty once soft-deleted.
    pub content: String,
    /// Optional stored attachment.
    pub attachment_kind: Option<MediaCategory>,
    /// Public URL of the attachment, if any.
    pub attachment_url: Option<String>,
    /// When the message was sent.
    pub created_at: DateTime<Utc>,
    /// Whether the recipient has read the message.
    pub is_read: bool,
    /// Soft-delete flag.
    pub is_deleted: bool,
}
