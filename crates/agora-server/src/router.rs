//! Inbound event handling: validate, persist, broadcast.
//!
//! The router is the only component that writes to the database or the
//! media store. Every accepted creation event results in exactly one
//! persisted record and one hub broadcast; every rejection results in zero
//! side effects and a distinct user-facing message.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;

use agora_shared::media;
use agora_shared::protocol::{
    AttachmentMeta, AttachmentUpload, ChatMessage, ClientEvent, DeletePost, NewMessage, NewPost,
    PostRecord, ServerEvent,
};
use agora_shared::types::{Author, ConversationId, MessageId, PostId, UserId};
use agora_store::{Attachment, Database, FeedEntry, Message as StoredMessage, Post, User};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::hub::EventHub;
use crate::media_store::MediaStore;

pub struct EventRouter {
    db: Arc<Mutex<Database>>,
    media: Arc<MediaStore>,
    hub: EventHub,
    config: Arc<ServerConfig>,
}

impl EventRouter {
    pub fn new(
        db: Arc<Mutex<Database>>,
        media: Arc<MediaStore>,
        hub: EventHub,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            db,
            media,
            hub,
            config,
        }
    }

    /// Dispatch one client frame. Errors bubble up to the connection task,
    /// which turns them into an `error` event for the originator only.
    pub async fn handle(&self, event: ClientEvent) -> Result<(), ServerError> {
        match event {
            ClientEvent::Post(new_post) => {
                self.create_post(new_post).await?;
                Ok(())
            }
            ClientEvent::DeletePost(request) => {
                self.delete_post(request);
                Ok(())
            }
            ClientEvent::Like(payload) => {
                self.relay_like(payload);
                Ok(())
            }
            ClientEvent::Message(new_message) => {
                self.send_message(new_message).await?;
                Ok(())
            }
        }
    }

    /// Create a post: validate, store attachment files, persist the record
    /// as one unit, broadcast it with the author rehydrated.
    pub async fn create_post(&self, new_post: NewPost) -> Result<PostRecord, ServerError> {
        let author = new_post
            .author
            .ok_or_else(|| ServerError::Validation("A post needs an author".to_string()))?;
        let content = new_post.content.trim().to_string();

        self.validate_submission(&content, &new_post.attachments)?;

        // The id is allocated before persistence so attachment URLs can
        // reference the final storage path.
        let id = PostId::new();
        let attachments = self
            .media
            .store_attachments(id.0, &new_post.attachments)
            .await?;
        let created_at = Utc::now();

        {
            let mut db = self.db.lock().await;
            db.upsert_user(&user_from_author(&author))?;

            let rows: Vec<Attachment> = attachments
                .iter()
                .enumerate()
                .map(|(ordinal, meta)| Attachment {
                    post_id: id.0,
                    ordinal: ordinal as u32,
                    kind: meta.kind,
                    url: meta.url.clone(),
                })
                .collect();

            db.insert_post(
                &Post {
                    id: id.0,
                    author_id: author.id.0,
                    content: content.clone(),
                    created_at,
                },
                &rows,
            )?;
        }

        let record = PostRecord {
            id,
            author,
            content,
            attachments,
            created_at,
        };

        info!(
            post = %record.id,
            author = %record.author.id,
            attachments = record.attachments.len(),
            "Post created"
        );

        self.hub.broadcast(ServerEvent::Post(record.clone()));
        Ok(record)
    }

    /// Spread a deletion to peers. Storage removal happens on the separate
    /// authenticated HTTP path; this op trusts its caller.
    pub fn delete_post(&self, request: DeletePost) {
        info!(
            post = %request.post_id,
            author = %request.post_author,
            "Re-broadcasting post deletion"
        );
        self.hub.broadcast(ServerEvent::DeletePost(request.post_id));
    }

    /// Pure relay: no validation, no persistence.
    pub fn relay_like(&self, payload: serde_json::Value) {
        self.hub.broadcast(ServerEvent::Like(payload));
    }

    /// Create a direct message, creating the conversation on first contact,
    /// and broadcast the persisted message.
    pub async fn send_message(&self, new_message: NewMessage) -> Result<ChatMessage, ServerError> {
        let author = new_message
            .author
            .ok_or_else(|| ServerError::Validation("A message needs an author".to_string()))?;
        let content = new_message.content.trim().to_string();

        let uploads = new_message.attachment.as_slice();
        self.validate_submission(&content, uploads)?;

        let id = MessageId::new();
        let attachment = self
            .media
            .store_attachments(id.0, uploads)
            .await?
            .into_iter()
            .next();
        let created_at = Utc::now();

        let conversation = {
            let mut db = self.db.lock().await;
            db.upsert_user(&user_from_author(&author))?;
            let conversation = db.find_or_create_conversation(
                author.id.0,
                new_message.recipient.0,
                created_at,
            )?;
            db.insert_message(&StoredMessage {
                id: id.0,
                conversation_id: conversation.id,
                sender_id: author.id.0,
                content: content.clone(),
                attachment_kind: attachment.as_ref().map(|a| a.kind),
                attachment_url: attachment.as_ref().map(|a| a.url.clone()),
                created_at,
                is_read: false,
                is_deleted: false,
            })?;
            conversation
        };

        let message = ChatMessage {
            id,
            conversation_id: ConversationId(conversation.id),
            author,
            content,
            attachment,
            created_at,
        };

        info!(
            message = %message.id,
            conversation = %message.conversation_id,
            "Message delivered"
        );

        self.hub.broadcast(ServerEvent::Message(message.clone()));
        Ok(message)
    }

    /// The ordered validation chain. Each failure carries its own message
    /// and nothing has touched storage yet when one fires.
    fn validate_submission(
        &self,
        content: &str,
        attachments: &[AttachmentUpload],
    ) -> Result<(), ServerError> {
        if content.is_empty() && attachments.is_empty() {
            return Err(ServerError::Validation(
                "Nothing to publish: add text or an attachment".to_string(),
            ));
        }

        if content.chars().count() > self.config.max_post_chars {
            return Err(ServerError::Validation(format!(
                "Content is limited to {} characters",
                self.config.max_post_chars
            )));
        }

        if attachments.len() > self.config.max_attachments {
            return Err(ServerError::Validation(format!(
                "At most {} attachments are allowed",
                self.config.max_attachments
            )));
        }

        for upload in attachments {
            if upload.size() > self.config.max_attachment_bytes {
                return Err(ServerError::AttachmentTooLarge {
                    size: upload.size(),
                    max: self.config.max_attachment_bytes,
                });
            }

            if !self.config.is_allowed_media_type(&upload.media_type) {
                return Err(ServerError::Validation(format!(
                    "Media type {} is not allowed",
                    upload.media_type
                )));
            }

            // Unreachable once the allow-list passed; kept so an Unknown
            // category can never slip into storage.
            if !media::classify(&upload.media_type, &upload.data).is_known() {
                return Err(ServerError::Validation(format!(
                    "Could not recognize attachment {}",
                    upload.file_name
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire <-> store projections
// ---------------------------------------------------------------------------

/// Store row derived from a submitted author object.
fn user_from_author(author: &Author) -> User {
    User {
        id: author.id.0,
        username: author.username.clone(),
        display_name: author.display_name.clone(),
        avatar_url: author.avatar_url.clone(),
        created_at: Utc::now(),
    }
}

/// Rehydrated author from a stored user row.
pub fn author_from_user(user: &User) -> Author {
    Author {
        id: UserId(user.id),
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        avatar_url: user.avatar_url.clone(),
    }
}

/// Feed row as broadcast/served to clients.
pub fn record_from_entry(entry: FeedEntry) -> PostRecord {
    PostRecord {
        id: PostId(entry.post.id),
        author: author_from_user(&entry.author),
        content: entry.post.content,
        attachments: entry
            .attachments
            .into_iter()
            .map(|a| AttachmentMeta {
                kind: a.kind,
                url: a.url,
            })
            .collect(),
        created_at: entry.post.created_at,
    }
}
