//! # vicinity-client
//!
//! The client-side real-time synchronization engine for Vicinity, a
//! proximity chat application. Maintains the live channel to the
//! server, persists every message locally for offline-first access,
//! fans inbound messages out to UI subscribers, derives per-peer
//! unread counts, positions nearby peers on the radar layout, and
//! reports significant device movement to the directory.

pub mod config;
pub mod engine;
pub mod layout;
pub mod location;
pub mod peers;
pub mod session;
pub mod subscriptions;
pub mod unread;

pub use config::ClientConfig;
pub use engine::{EngineError, InboundMessage, SyncEngine};
pub use layout::{PositionedPeer, RadarLayout};
pub use location::{spawn_location_reporter, LocationReporter, PositionError};
pub use peers::PeerRadar;
pub use session::Session;
pub use subscriptions::{Subscription, SubscriptionRegistry};
pub use unread::UnreadBadge;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging for an application embedding the
/// engine. Honors `RUST_LOG`; call at most once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("vicinity_client=debug,vicinity_net=debug,vicinity_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
