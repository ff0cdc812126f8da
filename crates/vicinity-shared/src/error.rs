use thiserror::Error;

/// Errors produced while interpreting wire frames.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The frame was not valid JSON or did not match the message shape.
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Neither `receiver_id` nor `group_id` was set.
    #[error("Message has no receiver")]
    MissingTarget,

    /// Both `receiver_id` and `group_id` were set.
    #[error("Message addresses both a user and a group")]
    AmbiguousTarget,
}
