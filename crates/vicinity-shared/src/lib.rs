//! # vicinity-shared
//!
//! Domain types and wire protocol shared between the Vicinity client
//! crates: the JSON message frame exchanged with the server, the peer
//! and profile models returned by the directory API, and the geo
//! distance utility used to gate location reporting.

pub mod constants;
pub mod geo;
pub mod protocol;
pub mod types;

mod error;

pub use error::ProtocolError;
pub use protocol::WireMessage;
pub use types::{ChatKind, LocationFix, Peer, UserProfile};
