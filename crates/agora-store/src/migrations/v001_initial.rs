//! v001 -- Initial schema creation.
//!
//! Creates the five core tables: `users`, `posts`, `attachments`,
//! `conversations`, and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    username     TEXT NOT NULL,
    display_name TEXT,
    avatar_url   TEXT,
    created_at   TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Posts (feed entries)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    author_id  TEXT NOT NULL,                 -- FK -> users(id)
    content    TEXT NOT NULL,                 -- trimmed, may be empty if attachments exist
    created_at TEXT NOT NULL,

    FOREIGN KEY (author_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC);

-- ----------------------------------------------------------------
-- Attachments (one row per stored file, ordered per post)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS attachments (
    post_id TEXT NOT NULL,                    -- FK -> posts(id)
    ordinal INTEGER NOT NULL,                 -- position within the post, 0-based
    kind    TEXT NOT NULL,                    -- image / gif / video
    url     TEXT NOT NULL,                    -- resolved public URL

    PRIMARY KEY (post_id, ordinal),
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Conversations (created implicitly by the first message of a pair)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id            TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    participant_a TEXT NOT NULL,              -- canonical order: a <= b
    participant_b TEXT NOT NULL,
    last_message  TEXT NOT NULL DEFAULT '',   -- preview text, '' when redacted
    updated_at    TEXT NOT NULL,

    UNIQUE (participant_a, participant_b)
);

CREATE INDEX IF NOT EXISTS idx_conversations_updated
    ON conversations(updated_at DESC);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    conversation_id TEXT NOT NULL,              -- FK -> conversations(id)
    sender_id       TEXT NOT NULL,              -- FK -> users(id)
    content         TEXT NOT NULL,              -- '' once soft-deleted
    attachment_kind TEXT,                       -- nullable, image / gif / video
    attachment_url  TEXT,                       -- nullable
    created_at      TEXT NOT NULL,
    is_read         INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    is_deleted      INTEGER NOT NULL DEFAULT 0, -- boolean 0/1

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_ts
    ON messages(conversation_id, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
