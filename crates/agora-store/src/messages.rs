//! CRUD operations for [`Message`] records.
//!
//! Message writes keep the owning conversation's preview text and timestamp
//! in sync: inserting bumps them, soft-deleting the newest message clears
//! the preview.

use std::str::FromStr;

use agora_shared::media::MediaCategory;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Message;

impl Database {
    /// Insert a message and bump the conversation preview in one transaction.
    pub fn insert_message(&mut self, message: &Message) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO messages
                 (id, conversation_id, sender_id, content, attachment_kind,
                  attachment_url, created_at, is_read, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                message.id.to_string(),
                message.conversation_id.to_string(),
                message.sender_id.to_string(),
                message.content,
                message.attachment_kind.map(|k| k.as_str()),
                message.attachment_url,
                message.created_at.to_rfc3339(),
                message.is_read,
                message.is_deleted,
            ],
        )?;

        tx.execute(
            "UPDATE conversations SET last_message = ?2, updated_at = ?3 WHERE id = ?1",
            params![
                message.conversation_id.to_string(),
                message.content,
                message.created_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Message history for a conversation, oldest first.
    pub fn get_messages_for_conversation(
        &self,
        conversation_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, conversation_id, sender_id, content, attachment_kind,
                    attachment_url, created_at, is_read, is_deleted
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at ASC
             LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(
            params![conversation_id.to_string(), limit, offset],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Fetch a single message by UUID.
    pub fn get_message(&self, id: Uuid) -> Result<Message> {
        self.conn()
            .query_row(
                "SELECT id, conversation_id, sender_id, content, attachment_kind,
                        attachment_url, created_at, is_read, is_deleted
                 FROM messages WHERE id = ?1",
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Mark every message in a conversation as read.
    pub fn mark_conversation_read(&self, conversation_id: Uuid) -> Result<()> {
        self.conn().execute(
            "UPDATE messages SET is_read = 1 WHERE conversation_id = ?1",
            params![conversation_id.to_string()],
        )?;
        Ok(())
    }

    /// Soft-delete a message: the row keeps its id and conversation linkage,
    /// the content is redacted. When the deleted message was the newest in
    /// its conversation, the conversation preview is cleared too.
    ///
    /// Returns `false` (no-op) for unknown ids.
    pub fn soft_delete_message(&mut self, id: Uuid) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;

        let target: Option<(String, String)> = tx
            .query_row(
                "SELECT conversation_id, created_at FROM messages WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((conversation_id, created_at)) = target else {
            return Ok(false);
        };

        tx.execute(
            "UPDATE messages SET is_deleted = 1, content = '' WHERE id = ?1",
            params![id.to_string()],
        )?;

        let newest: Option<String> = tx
            .query_row(
                "SELECT MAX(created_at) FROM messages WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        if newest.as_deref() == Some(created_at.as_str()) {
            tx.execute(
                "UPDATE conversations SET last_message = '' WHERE id = ?1",
                params![conversation_id],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Message`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let conversation_str: String = row.get(1)?;
    let sender_str: String = row.get(2)?;
    let content: String = row.get(3)?;
    let kind_str: Option<String> = row.get(4)?;
    let attachment_url: Option<String> = row.get(5)?;
    let created_str: String = row.get(6)?;
    let is_read: bool = row.get(7)?;
    let is_deleted: bool = row.get(8)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let conversation_id = Uuid::parse_str(&conversation_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let sender_id = Uuid::parse_str(&sender_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let attachment_kind =
        kind_str.map(|s| MediaCategory::from_str(&s).unwrap_or(MediaCategory::Unknown));

    Ok(Message {
        id,
        conversation_id,
        sender_id,
        content,
        attachment_kind,
        attachment_url,
        created_at,
        is_read,
        is_deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_message(conversation_id: Uuid, content: &str, at: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: Uuid::new_v4(),
            content: content.to_string(),
            attachment_kind: None,
            attachment_url: None,
            created_at: at,
            is_read: false,
            is_deleted: false,
        }
    }

    fn conversation(db: &Database) -> Uuid {
        db.find_or_create_conversation(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
            .unwrap()
            .id
    }

    #[test]
    fn insert_bumps_conversation_preview() {
        let mut db = Database::open_in_memory().unwrap();
        let conversation_id = conversation(&db);
        let now = Utc::now();

        db.insert_message(&seed_message(conversation_id, "first", now))
            .unwrap();
        db.insert_message(&seed_message(
            conversation_id,
            "second",
            now + chrono::Duration::seconds(1),
        ))
        .unwrap();

        let stored = db.get_conversation(conversation_id).unwrap();
        assert_eq!(stored.last_message, "second");
    }

    #[test]
    fn history_is_oldest_first() {
        let mut db = Database::open_in_memory().unwrap();
        let conversation_id = conversation(&db);
        let now = Utc::now();

        for (content, secs) in [("b", 2), ("a", 1), ("c", 3)] {
            db.insert_message(&seed_message(
                conversation_id,
                content,
                now + chrono::Duration::seconds(secs),
            ))
            .unwrap();
        }

        let history = db
            .get_messages_for_conversation(conversation_id, 50, 0)
            .unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[test]
    fn soft_delete_newest_clears_preview() {
        let mut db = Database::open_in_memory().unwrap();
        let conversation_id = conversation(&db);
        let now = Utc::now();

        let old = seed_message(conversation_id, "old", now);
        let newest = seed_message(conversation_id, "newest", now + chrono::Duration::seconds(5));
        db.insert_message(&old).unwrap();
        db.insert_message(&newest).unwrap();

        assert!(db.soft_delete_message(newest.id).unwrap());

        let stored = db.get_message(newest.id).unwrap();
        assert!(stored.is_deleted);
        assert!(stored.content.is_empty());
        assert_eq!(db.get_conversation(conversation_id).unwrap().last_message, "");
    }

    #[test]
    fn soft_delete_older_keeps_preview() {
        let mut db = Database::open_in_memory().unwrap();
        let conversation_id = conversation(&db);
        let now = Utc::now();

        let old = seed_message(conversation_id, "old", now);
        let newest = seed_message(conversation_id, "newest", now + chrono::Duration::seconds(5));
        db.insert_message(&old).unwrap();
        db.insert_message(&newest).unwrap();

        assert!(db.soft_delete_message(old.id).unwrap());
        assert_eq!(
            db.get_conversation(conversation_id).unwrap().last_message,
            "newest"
        );
    }

    #[test]
    fn soft_delete_unknown_id_is_noop() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(!db.soft_delete_message(Uuid::new_v4()).unwrap());
    }

    #[test]
    fn mark_read_sets_every_row() {
        let mut db = Database::open_in_memory().unwrap();
        let conversation_id = conversation(&db);
        let now = Utc::now();

        for i in 0..3 {
            db.insert_message(&seed_message(
                conversation_id,
                "m",
                now + chrono::Duration::seconds(i),
            ))
            .unwrap();
        }

        db.mark_conversation_read(conversation_id).unwrap();
        let history = db
            .get_messages_for_conversation(conversation_id, 50, 0)
            .unwrap();
        assert!(history.iter().all(|m| m.is_read));
    }
}
