//! CRUD operations for [`User`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    /// Insert or refresh a user. Display data always reflects the most
    /// recent creation event that carried this author.
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, username, display_name, avatar_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 username = excluded.username,
                 display_name = excluded.display_name,
                 avatar_url = excluded.avatar_url",
            params![
                user.id.to_string(),
                user.username,
                user.display_name,
                user.avatar_url,
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a single user by UUID.
    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, display_name, avatar_url, created_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}

/// Map a `rusqlite::Row` to a [`User`].
pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let username: String = row.get(1)?;
    let display_name: Option<String> = row.get(2)?;
    let avatar_url: Option<String> = row.get(3)?;
    let created_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        id,
        username,
        display_name,
        avatar_url,
        created_at,
    })
}
