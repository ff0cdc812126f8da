//! v001 -- Initial schema creation.
//!
//! Creates the two core tables: `messages` (the append-only chat log)
//! and `session` (expiring key-value slots).

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,  -- locally assigned, monotonic
    kind            TEXT NOT NULL,                      -- wire "type", e.g. 'text'
    sender_id       INTEGER NOT NULL,
    sender_name     TEXT NOT NULL,
    chat_kind       TEXT NOT NULL,                      -- 'user' | 'group'
    conversation_id INTEGER NOT NULL,                   -- normalized receiver_id / group_id
    created_at      TEXT NOT NULL,                      -- ISO-8601 / RFC-3339
    content         TEXT NOT NULL,
    is_read         INTEGER NOT NULL DEFAULT 0          -- boolean 0/1
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(chat_kind, conversation_id, created_at);

CREATE INDEX IF NOT EXISTS idx_messages_unread
    ON messages(sender_id, conversation_id, is_read);

-- ----------------------------------------------------------------
-- Session (expiring key-value slots, e.g. the current-chat pointer)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS session (
    key       TEXT PRIMARY KEY NOT NULL,
    value     TEXT NOT NULL,                            -- JSON payload
    stored_at TEXT NOT NULL                             -- ISO-8601
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
