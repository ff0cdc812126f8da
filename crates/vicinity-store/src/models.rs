//! Domain model structs persisted in the local database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vicinity_shared::ChatKind;

/// A persisted chat message.
///
/// This is the wire message plus the fields assigned at append time:
/// the monotonic local id, the read flag, and the normalized
/// conversation key `(chat_kind, conversation_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredMessage {
    /// Locally assigned, unique, monotonically increasing id.
    pub id: i64,
    /// Wire message kind (currently always `"text"`).
    pub kind: String,
    pub sender_id: i64,
    pub sender_name: String,
    /// Whether the conversation targets a user or a group.
    pub chat_kind: ChatKind,
    /// Normalized from `receiver_id` (direct) or `group_id` (group).
    pub conversation_id: i64,
    /// When the message was sent (as reported by the sender).
    pub created_at: DateTime<Utc>,
    pub content: String,
    /// Flipped to `true` once, when the conversation view processes it.
    pub is_read: bool,
}
