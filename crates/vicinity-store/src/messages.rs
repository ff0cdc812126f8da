use chrono::{DateTime, Utc};
use rusqlite::params;

use vicinity_shared::{ChatKind, WireMessage};

use crate::database::Database;
use crate::error::Result;
use crate::models::StoredMessage;

impl Database {
    /// Append a wire message to the local log.
    ///
    /// Assigns the next monotonic id, normalizes the conversation key
    /// from whichever target field is set, and stores the row unread.
    /// No content-level deduplication is attempted; duplicates are
    /// possible and tolerated.
    pub fn append_message(&self, message: &WireMessage) -> Result<StoredMessage> {
        let (chat_kind, conversation_id) = message.target()?;

        self.conn().execute(
            "INSERT INTO messages
                 (kind, sender_id, sender_name, chat_kind, conversation_id, created_at, content, is_read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
            params![
                message.kind,
                message.sender_id,
                message.sender_name,
                chat_kind.as_str(),
                conversation_id,
                message.created_at.to_rfc3339(),
                message.content,
            ],
        )?;

        let id = self.conn().last_insert_rowid();

        Ok(StoredMessage {
            id,
            kind: message.kind.clone(),
            sender_id: message.sender_id,
            sender_name: message.sender_name.clone(),
            chat_kind,
            conversation_id,
            created_at: message.created_at,
            content: message.content.clone(),
            is_read: false,
        })
    }

    /// Full history of one conversation, oldest first.
    ///
    /// For direct chats both directions of the pair are returned:
    /// messages we sent to the partner and messages the partner sent
    /// to us. For group chats every message in the group is returned.
    /// Ordered by `created_at` ascending with the local id as a
    /// tiebreak, so the ordering is total regardless of insertion
    /// order.
    pub fn conversation(
        &self,
        partner_id: i64,
        kind: ChatKind,
        self_id: i64,
    ) -> Result<Vec<StoredMessage>> {
        let sql = match kind {
            ChatKind::User => {
                "SELECT id, kind, sender_id, sender_name, chat_kind, conversation_id,
                        created_at, content, is_read
                 FROM messages
                 WHERE chat_kind = 'user'
                   AND ((sender_id = ?1 AND conversation_id = ?2)
                     OR (sender_id = ?2 AND conversation_id = ?1))
                 ORDER BY created_at ASC, id ASC"
            }
            ChatKind::Group => {
                "SELECT id, kind, sender_id, sender_name, chat_kind, conversation_id,
                        created_at, content, is_read
                 FROM messages
                 WHERE chat_kind = 'group' AND conversation_id = ?2
                 ORDER BY created_at ASC, id ASC"
            }
        };

        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![self_id, partner_id], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Flip a message's read flag.
    ///
    /// Idempotent: marking an already-read message or an absent id is
    /// a no-op.
    pub fn mark_read(&self, id: i64) -> Result<()> {
        self.conn()
            .execute("UPDATE messages SET is_read = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Number of unread direct messages from `from_peer` to `to_self`.
    pub fn count_unread(&self, from_peer: i64, to_self: i64) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages
             WHERE chat_kind = 'user'
               AND sender_id = ?1
               AND conversation_id = ?2
               AND is_read = 0",
            params![from_peer, to_self],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let chat_kind_str: String = row.get(4)?;
    let ts_str: String = row.get(6)?;

    let chat_kind = ChatKind::from_str_opt(&chat_kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown chat kind: {chat_kind_str}").into(),
        )
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(StoredMessage {
        id: row.get(0)?,
        kind: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row.get(3)?,
        chat_kind,
        conversation_id: row.get(5)?,
        created_at,
        content: row.get(7)?,
        is_read: row.get::<_, i64>(8)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SELF_ID: i64 = 1;
    const PEER_ID: i64 = 2;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn direct_at(sender: i64, receiver: i64, content: &str, secs: i64) -> WireMessage {
        let mut msg = WireMessage::direct(sender, "someone", receiver, content);
        msg.created_at = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        msg
    }

    #[test]
    fn append_assigns_monotonic_ids_and_stores_unread() {
        let (_dir, db) = open_db();

        let first = db
            .append_message(&direct_at(PEER_ID, SELF_ID, "one", 0))
            .unwrap();
        let second = db
            .append_message(&direct_at(PEER_ID, SELF_ID, "two", 1))
            .unwrap();

        assert!(second.id > first.id);
        assert!(!first.is_read);
        assert_eq!(first.chat_kind, ChatKind::User);
        assert_eq!(first.conversation_id, SELF_ID);
    }

    #[test]
    fn append_normalizes_group_target() {
        let (_dir, db) = open_db();

        let stored = db
            .append_message(&WireMessage::group(SELF_ID, "me", 77, "hi group"))
            .unwrap();

        assert_eq!(stored.chat_kind, ChatKind::Group);
        assert_eq!(stored.conversation_id, 77);
    }

    #[test]
    fn conversation_is_ordered_regardless_of_insertion_order() {
        let (_dir, db) = open_db();

        // Insert out of chronological order.
        db.append_message(&direct_at(PEER_ID, SELF_ID, "third", 30))
            .unwrap();
        db.append_message(&direct_at(SELF_ID, PEER_ID, "first", 10))
            .unwrap();
        db.append_message(&direct_at(PEER_ID, SELF_ID, "second", 20))
            .unwrap();

        let history = db.conversation(PEER_ID, ChatKind::User, SELF_ID).unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);

        for pair in history.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[test]
    fn conversation_excludes_other_pairs() {
        let (_dir, db) = open_db();

        db.append_message(&direct_at(PEER_ID, SELF_ID, "for us", 0))
            .unwrap();
        db.append_message(&direct_at(3, SELF_ID, "other peer", 1))
            .unwrap();
        db.append_message(&direct_at(PEER_ID, 4, "other target", 2))
            .unwrap();

        let history = db.conversation(PEER_ID, ChatKind::User, SELF_ID).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "for us");
    }

    #[test]
    fn mark_read_is_idempotent() {
        let (_dir, db) = open_db();

        let stored = db
            .append_message(&direct_at(PEER_ID, SELF_ID, "hello", 0))
            .unwrap();

        db.mark_read(stored.id).unwrap();
        db.mark_read(stored.id).unwrap(); // second call must not error

        let history = db.conversation(PEER_ID, ChatKind::User, SELF_ID).unwrap();
        assert!(history[0].is_read);

        // Absent id is a no-op, not an error.
        db.mark_read(9_999).unwrap();
    }

    #[test]
    fn count_unread_only_counts_inbound_unread() {
        let (_dir, db) = open_db();

        // Two unread from the peer.
        db.append_message(&direct_at(PEER_ID, SELF_ID, "a", 0))
            .unwrap();
        db.append_message(&direct_at(PEER_ID, SELF_ID, "b", 1))
            .unwrap();
        // One read from the peer.
        let read = db
            .append_message(&direct_at(PEER_ID, SELF_ID, "c", 2))
            .unwrap();
        db.mark_read(read.id).unwrap();
        // One outbound from self.
        db.append_message(&direct_at(SELF_ID, PEER_ID, "d", 3))
            .unwrap();

        assert_eq!(db.count_unread(PEER_ID, SELF_ID).unwrap(), 2);
        assert_eq!(db.count_unread(SELF_ID, PEER_ID).unwrap(), 1);
    }
}
