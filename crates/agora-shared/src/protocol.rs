//! Wire protocol for the Agora real-time channel.
//!
//! Every frame is a JSON object `{ "type": ..., "data": ... }`. The two
//! enums below are the single source of truth for what can travel in each
//! direction; adding an event kind means adding a variant, and every match
//! on them is exhaustive by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::media::MediaCategory;
use crate::types::{Author, ConversationId, MessageId, PostId, UserId};

/// Events a client may send to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientEvent {
    /// Create a new post (feed entry with optional attachments).
    #[serde(rename = "post")]
    Post(NewPost),

    /// Announce deletion of a post. Persistence-side deletion happens on a
    /// separate authenticated path; this only triggers the re-broadcast.
    #[serde(rename = "deletePost")]
    DeletePost(DeletePost),

    /// Like payload, relayed to peers as-is.
    #[serde(rename = "likeToServer")]
    Like(serde_json::Value),

    /// Send a direct message inside (or starting) a conversation.
    #[serde(rename = "message")]
    Message(NewMessage),
}

/// Events the server sends to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    /// A post was persisted; carries the full record with the author
    /// rehydrated from the original submission.
    #[serde(rename = "post")]
    Post(PostRecord),

    /// A post id was deleted.
    #[serde(rename = "deletePost")]
    DeletePost(PostId),

    /// Relayed like payload.
    #[serde(rename = "likeToClient")]
    Like(serde_json::Value),

    /// A direct message was persisted and delivered.
    #[serde(rename = "message")]
    Message(ChatMessage),

    /// Request rejected; sent only to the originating connection.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Post creation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    /// Absence is a validation error, not a parse error.
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub content: String,
    /// Client-computed character count. Advisory: the server validates
    /// against the content it actually received.
    #[serde(default)]
    pub content_length: usize,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

/// Attachment bytes as they travel inside a JSON frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentUpload {
    pub file_name: String,
    pub media_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl AttachmentUpload {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Post deletion payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePost {
    pub post_id: PostId,
    pub post_author: UserId,
}

/// Direct-message creation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    /// Absence is a validation error, not a parse error.
    #[serde(default)]
    pub author: Option<Author>,
    pub recipient: UserId,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentUpload>,
}

/// A persisted post as broadcast to peers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: PostId,
    pub author: Author,
    pub content: String,
    pub attachments: Vec<AttachmentMeta>,
    pub created_at: DateTime<Utc>,
}

/// A stored attachment: its resolved category and public URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub kind: MediaCategory,
    pub url: String,
}

/// A persisted direct message as broadcast to peers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub author: Author,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentMeta>,
    pub created_at: DateTime<Utc>,
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Serde adapter: `Vec<u8>` as standard base64 text.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    fn author() -> Author {
        Author {
            id: UserId::new(),
            username: "ada".to_string(),
            display_name: Some("Ada L.".to_string()),
            avatar_url: None,
        }
    }

    #[test]
    fn client_event_tags_match_wire_names() {
        let post = ClientEvent::Post(NewPost {
            author: Some(author()),
            content: "hello".to_string(),
            content_length: 5,
            attachments: vec![],
        });
        let value: serde_json::Value = serde_json::from_str(&post.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "post");

        let like = ClientEvent::Like(serde_json::json!({ "postId": "x" }));
        let value: serde_json::Value = serde_json::from_str(&like.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "likeToServer");
    }

    #[test]
    fn server_like_is_retagged_for_clients() {
        let like = ServerEvent::Like(serde_json::json!({ "postId": "x" }));
        let value: serde_json::Value = serde_json::from_str(&like.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "likeToClient");
        assert_eq!(value["data"]["postId"], "x");
    }

    #[test]
    fn delete_broadcast_carries_bare_post_id() {
        let id = PostId::new();
        let event = ServerEvent::DeletePost(id);
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "deletePost");
        assert_eq!(value["data"], id.to_string());
    }

    #[test]
    fn attachment_bytes_survive_base64_framing() {
        let event = ClientEvent::Post(NewPost {
            author: Some(author()),
            content: String::new(),
            content_length: 0,
            attachments: vec![AttachmentUpload {
                file_name: "photo.jpg".to_string(),
                media_type: "image/jpeg".to_string(),
                data: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00],
            }],
        });

        let restored = ClientEvent::from_json(&event.to_json().unwrap()).unwrap();
        match restored {
            ClientEvent::Post(post) => {
                assert_eq!(post.attachments[0].data, vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn malformed_frame_is_rejected() {
        assert!(ClientEvent::from_json("{\"type\":\"nope\"}").is_err());
        assert!(ServerEvent::from_json("not json").is_err());
    }
}
