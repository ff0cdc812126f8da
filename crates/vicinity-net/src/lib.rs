// Client networking layer: the live server channel and the HTTP directory API.

pub mod channel;
pub mod directory;

mod error;

pub use channel::{spawn_channel, ChannelHandle, ChannelNotification, ChannelState};
pub use directory::{DirectoryClient, NewUser, UserPatch};
pub use error::NetError;
