//! CRUD operations for [`Conversation`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Conversation;

/// Canonical participant ordering so each pair maps to exactly one row.
fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Database {
    /// Fetch the conversation between two users, creating it if this is the
    /// first message of the pair.
    pub fn find_or_create_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Conversation> {
        let (a, b) = canonical_pair(user_a, user_b);

        let existing = self.conn().query_row(
            "SELECT id, participant_a, participant_b, last_message, updated_at
             FROM conversations
             WHERE participant_a = ?1 AND participant_b = ?2",
            params![a.to_string(), b.to_string()],
            row_to_conversation,
        );

        match existing {
            Ok(conversation) => Ok(conversation),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                let conversation = Conversation {
                    id: Uuid::new_v4(),
                    participant_a: a,
                    participant_b: b,
                    last_message: String::new(),
                    updated_at: now,
                };
                self.conn().execute(
                    "INSERT INTO conversations
                         (id, participant_a, participant_b, last_message, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        conversation.id.to_string(),
                        a.to_string(),
                        b.to_string(),
                        conversation.last_message,
                        conversation.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(conversation)
            }
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    /// Fetch a single conversation by UUID.
    pub fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.conn()
            .query_row(
                "SELECT id, participant_a, participant_b, last_message, updated_at
                 FROM conversations WHERE id = ?1",
                params![id.to_string()],
                row_to_conversation,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All conversations a user participates in, most recently active first.
    pub fn list_conversations_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, participant_a, participant_b, last_message, updated_at
             FROM conversations
             WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY updated_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id.to_string()], row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok(conversations)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Conversation`].
fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let id_str: String = row.get(0)?;
    let a_str: String = row.get(1)?;
    let b_str: String = row.get(2)?;
    let last_message: String = row.get(3)?;
    let updated_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let participant_a = Uuid::parse_str(&a_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let participant_b = Uuid::parse_str(&b_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let updated_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&updated_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Conversation {
        id,
        participant_a,
        participant_b,
        last_message,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_order_does_not_matter() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        let first = db.find_or_create_conversation(a, b, now).unwrap();
        let second = db.find_or_create_conversation(b, a, now).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn listing_is_most_recent_first() {
        let db = Database::open_in_memory().unwrap();
        let me = Uuid::new_v4();
        let now = Utc::now();

        let old = db
            .find_or_create_conversation(me, Uuid::new_v4(), now - chrono::Duration::hours(2))
            .unwrap();
        let recent = db
            .find_or_create_conversation(me, Uuid::new_v4(), now)
            .unwrap();

        let listed = db.list_conversations_for_user(me).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, recent.id);
        assert_eq!(listed[1].id, old.id);
    }
}
