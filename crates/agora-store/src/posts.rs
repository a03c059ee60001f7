//! CRUD operations for [`Post`] records and their attachments.

use std::str::FromStr;

use agora_shared::media::MediaCategory;
use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Attachment, FeedEntry, Post};

impl Database {
    /// Insert a post together with its attachments as one unit.
    ///
    /// Either everything lands or nothing does; a failure after the post row
    /// was written must not leave attachment rows behind (and vice versa).
    pub fn insert_post(&mut self, post: &Post, attachments: &[Attachment]) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO posts (id, author_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                post.id.to_string(),
                post.author_id.to_string(),
                post.content,
                post.created_at.to_rfc3339(),
            ],
        )?;

        for attachment in attachments {
            tx.execute(
                "INSERT INTO attachments (post_id, ordinal, kind, url)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    attachment.post_id.to_string(),
                    attachment.ordinal,
                    attachment.kind.as_str(),
                    attachment.url,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Fetch a single post by UUID.
    pub fn get_post(&self, id: Uuid) -> Result<Post> {
        self.conn()
            .query_row(
                "SELECT id, author_id, content, created_at
                 FROM posts WHERE id = ?1",
                params![id.to_string()],
                row_to_post,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Attachments of a post, in ordinal order.
    pub fn get_attachments(&self, post_id: Uuid) -> Result<Vec<Attachment>> {
        let mut stmt = self.conn().prepare(
            "SELECT post_id, ordinal, kind, url
             FROM attachments
             WHERE post_id = ?1
             ORDER BY ordinal ASC",
        )?;

        let rows = stmt.query_map(params![post_id.to_string()], row_to_attachment)?;

        let mut attachments = Vec::new();
        for row in rows {
            attachments.push(row?);
        }
        Ok(attachments)
    }

    /// Feed page: posts newest first, each joined with its author and
    /// attachments.
    pub fn list_feed(&self, limit: u32, offset: u32) -> Result<Vec<FeedEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT p.id, p.author_id, p.content, p.created_at,
                    u.id, u.username, u.display_name, u.avatar_url, u.created_at
             FROM posts p
             JOIN users u ON u.id = p.author_id
             ORDER BY p.created_at DESC
             LIMIT ?1 OFFSET ?2",
        )?;

        let rows = stmt.query_map(params![limit, offset], |row| {
            let post = row_to_post(row)?;
            let author = row_to_user_offset(row, 4)?;
            Ok((post, author))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (post, author) = row?;
            let attachments = self.get_attachments(post.id)?;
            entries.push(FeedEntry {
                post,
                author,
                attachments,
            });
        }
        Ok(entries)
    }

    /// Delete a post by UUID. Attachment rows cascade. Returns `true` if a
    /// row was deleted.
    pub fn delete_post(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM posts WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Post`].
fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let id_str: String = row.get(0)?;
    let author_str: String = row.get(1)?;
    let content: String = row.get(2)?;
    let created_str: String = row.get(3)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let author_id = Uuid::parse_str(&author_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Post {
        id,
        author_id,
        content,
        created_at,
    })
}

/// Map a row slice starting at `base` to a [`crate::models::User`].
fn row_to_user_offset(
    row: &rusqlite::Row<'_>,
    base: usize,
) -> rusqlite::Result<crate::models::User> {
    let id_str: String = row.get(base)?;
    let username: String = row.get(base + 1)?;
    let display_name: Option<String> = row.get(base + 2)?;
    let avatar_url: Option<String> = row.get(base + 3)?;
    let created_str: String = row.get(base + 4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(base, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                base + 4,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

    Ok(crate::models::User {
        id,
        username,
        display_name,
        avatar_url,
        created_at,
    })
}

/// Map a `rusqlite::Row` to an [`Attachment`].
fn row_to_attachment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attachment> {
    let post_str: String = row.get(0)?;
    let ordinal: u32 = row.get(1)?;
    let kind_str: String = row.get(2)?;
    let url: String = row.get(3)?;

    let post_id = Uuid::parse_str(&post_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    // FromStr is infallible (unknown tags collapse to Unknown).
    let kind = MediaCategory::from_str(&kind_str).unwrap_or(MediaCategory::Unknown);

    Ok(Attachment {
        post_id,
        ordinal,
        kind,
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn seed_user(db: &Database, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.upsert_user(&User {
            id,
            username: username.to_string(),
            display_name: None,
            avatar_url: None,
            created_at: Utc::now(),
        })
        .unwrap();
        id
    }

    #[test]
    fn insert_and_fetch_with_attachments() {
        let mut db = Database::open_in_memory().unwrap();
        let author_id = seed_user(&db, "ada");

        let post = Post {
            id: Uuid::new_v4(),
            author_id,
            content: "hello".to_string(),
            created_at: Utc::now(),
        };
        let attachments = vec![Attachment {
            post_id: post.id,
            ordinal: 0,
            kind: MediaCategory::Image,
            url: "http://localhost/media/x/0.jpg".to_string(),
        }];

        db.insert_post(&post, &attachments).unwrap();

        assert_eq!(db.get_post(post.id).unwrap().content, "hello");
        let stored = db.get_attachments(post.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, MediaCategory::Image);
    }

    #[test]
    fn feed_is_newest_first() {
        let mut db = Database::open_in_memory().unwrap();
        let author_id = seed_user(&db, "ada");

        for (content, secs) in [("first", 1), ("second", 2), ("third", 3)] {
            let post = Post {
                id: Uuid::new_v4(),
                author_id,
                content: content.to_string(),
                created_at: Utc::now() + chrono::Duration::seconds(secs),
            };
            db.insert_post(&post, &[]).unwrap();
        }

        let feed = db.list_feed(10, 0).unwrap();
        let contents: Vec<_> = feed.iter().map(|e| e.post.content.as_str()).collect();
        assert_eq!(contents, vec!["third", "second", "first"]);
        assert_eq!(feed[0].author.username, "ada");
    }

    #[test]
    fn delete_cascades_attachments() {
        let mut db = Database::open_in_memory().unwrap();
        let author_id = seed_user(&db, "ada");

        let post = Post {
            id: Uuid::new_v4(),
            author_id,
            content: String::new(),
            created_at: Utc::now(),
        };
        db.insert_post(
            &post,
            &[Attachment {
                post_id: post.id,
                ordinal: 0,
                kind: MediaCategory::Gif,
                url: "http://localhost/media/x/0.gif".to_string(),
            }],
        )
        .unwrap();

        assert!(db.delete_post(post.id).unwrap());
        assert!(db.get_attachments(post.id).unwrap().is_empty());
        assert!(!db.delete_post(post.id).unwrap());
    }
}
