//! The JSON frame exchanged over the server channel.
//!
//! One message per frame, no acknowledgement, sequence number, or
//! heartbeat. Exactly one of `receiver_id` / `group_id` is set; that
//! choice determines which conversation the message belongs to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::ChatKind;

/// A chat message as it travels over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireMessage {
    /// Message kind; currently always `"text"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub sender_id: i64,
    pub sender_name: String,
    /// Set for direct messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<i64>,
    /// Set for group messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

impl WireMessage {
    /// Build a direct text message addressed to `receiver_id`.
    pub fn direct(sender_id: i64, sender_name: &str, receiver_id: i64, content: &str) -> Self {
        Self {
            kind: "text".to_string(),
            sender_id,
            sender_name: sender_name.to_string(),
            receiver_id: Some(receiver_id),
            group_id: None,
            created_at: Utc::now(),
            content: content.to_string(),
        }
    }

    /// Build a group text message addressed to `group_id`.
    pub fn group(sender_id: i64, sender_name: &str, group_id: i64, content: &str) -> Self {
        Self {
            kind: "text".to_string(),
            sender_id,
            sender_name: sender_name.to_string(),
            receiver_id: None,
            group_id: Some(group_id),
            created_at: Utc::now(),
            content: content.to_string(),
        }
    }

    /// The conversation this message belongs to, normalized from
    /// whichever of the two target fields is present.
    pub fn target(&self) -> Result<(ChatKind, i64), ProtocolError> {
        match (self.group_id, self.receiver_id) {
            (Some(_), Some(_)) => Err(ProtocolError::AmbiguousTarget),
            (Some(group), None) => Ok((ChatKind::Group, group)),
            (None, Some(user)) => Ok((ChatKind::User, user)),
            (None, None) => Err(ProtocolError::MissingTarget),
        }
    }

    /// Serialize to a JSON frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a JSON frame.
    pub fn from_json(frame: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(frame)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let msg = WireMessage::direct(7, "ada", 12, "hello");

        let frame = msg.to_json().unwrap();
        let restored = WireMessage::from_json(&frame).unwrap();

        assert_eq!(msg, restored);
        assert_eq!(restored.target().unwrap(), (ChatKind::User, 12));
    }

    #[test]
    fn test_type_field_name_on_the_wire() {
        let msg = WireMessage::group(1, "bo", 99, "hi all");
        let frame = msg.to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["group_id"], 99);
        assert!(value.get("receiver_id").is_none());
    }

    #[test]
    fn test_target_rejects_missing_and_ambiguous() {
        let mut msg = WireMessage::direct(1, "bo", 2, "x");
        msg.group_id = Some(3);
        assert!(matches!(msg.target(), Err(ProtocolError::AmbiguousTarget)));

        msg.group_id = None;
        msg.receiver_id = None;
        assert!(matches!(msg.target(), Err(ProtocolError::MissingTarget)));
    }
}
