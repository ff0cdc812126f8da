//! Expiring key-value session slots.
//!
//! Currently the only slot is the current-conversation pointer, which
//! survives a page reload but is treated as absent once it is older
//! than [`CHAT_POINTER_TTL_SECS`].
//!
//! [`CHAT_POINTER_TTL_SECS`]: vicinity_shared::constants::CHAT_POINTER_TTL_SECS

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use vicinity_shared::constants::CHAT_POINTER_TTL_SECS;
use vicinity_shared::ChatKind;

use crate::database::Database;
use crate::error::Result;

const CURRENT_CHAT_KEY: &str = "current_chat";

/// The conversation the user currently has open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatPointer {
    pub id: i64,
    pub kind: ChatKind,
    pub username: String,
    pub image_url: String,
}

impl Database {
    /// Persist the current-conversation pointer, stamping it with now.
    pub fn put_current_chat(&self, chat: &ChatPointer) -> Result<()> {
        let value = serde_json::to_string(chat)?;

        self.conn().execute(
            "INSERT INTO session (key, value, stored_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, stored_at = ?3",
            params![CURRENT_CHAT_KEY, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Load the current-conversation pointer.
    ///
    /// Entries older than the 30-minute TTL are deleted and reported
    /// absent; a corrupt payload is treated the same way.
    pub fn current_chat(&self) -> Result<Option<ChatPointer>> {
        let row: Option<(String, String)> = self
            .conn()
            .query_row(
                "SELECT value, stored_at FROM session WHERE key = ?1",
                params![CURRENT_CHAT_KEY],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        let Some((value, stored_at)) = row else {
            return Ok(None);
        };

        let stored_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&stored_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::UNIX_EPOCH);

        if Utc::now() - stored_at > Duration::seconds(CHAT_POINTER_TTL_SECS) {
            tracing::debug!("current-chat pointer expired, clearing");
            self.clear_current_chat()?;
            return Ok(None);
        }

        match serde_json::from_str(&value) {
            Ok(chat) => Ok(Some(chat)),
            Err(e) => {
                tracing::warn!(error = %e, "corrupt current-chat pointer, clearing");
                self.clear_current_chat()?;
                Ok(None)
            }
        }
    }

    /// Drop the current-conversation pointer.
    pub fn clear_current_chat(&self) -> Result<()> {
        self.conn().execute(
            "DELETE FROM session WHERE key = ?1",
            params![CURRENT_CHAT_KEY],
        )?;
        Ok(())
    }
}
