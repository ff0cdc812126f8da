use thiserror::Error;

/// Errors produced by the networking layer.
#[derive(Error, Debug)]
pub enum NetError {
    /// `send` was called while the channel is not open. The caller
    /// decides whether and how to surface this; nothing is queued.
    #[error("Channel is not open")]
    NotConnected,

    /// The channel controller task has terminated.
    #[error("Channel controller is gone")]
    ChannelClosed,

    /// HTTP directory request failed.
    #[error("Directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A frame could not be encoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] vicinity_shared::ProtocolError),
}
