//! # vicinity-store
//!
//! Local durable storage for the Vicinity client, backed by SQLite.
//!
//! Messages are an append-only log keyed by a locally assigned
//! monotonic id; rows are mutated only to flip their read flag and are
//! never deleted in normal operation. The crate exposes a synchronous
//! `Database` handle that wraps a `rusqlite::Connection` and provides
//! typed helpers for the message log and the expiring session slot.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod session;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
pub use session::ChatPointer;
