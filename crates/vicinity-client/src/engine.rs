//! The synchronization engine.
//!
//! Owns the channel to the server, the local message store, and the
//! subscriber registry, and enforces the one ordering guarantee the
//! system makes: an inbound message is persisted before it is fanned
//! out, so any subscriber can immediately re-query the store and see
//! the message it was just notified about.
//!
//! Storage failures on the read paths are absorbed here: views get
//! empty histories and zero counts instead of errors, trading unread
//! badge accuracy for availability.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use vicinity_net::{
    spawn_channel, ChannelHandle, ChannelNotification, ChannelState, NetError,
};
use vicinity_shared::{ChatKind, WireMessage};
use vicinity_store::{ChatPointer, Database, StoredMessage, StoreError};

use crate::config::ClientConfig;
use crate::session::Session;
use crate::subscriptions::{Subscription, SubscriptionRegistry};

/// Errors surfaced to callers of the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Sign-in did not resolve a user; chat components cannot start.
    #[error("No resolved user identity")]
    MissingIdentity,

    /// A send was attempted while the channel is not open. The message
    /// was not queued; the caller decides how to inform the user.
    #[error("Channel is offline")]
    Offline,

    #[error(transparent)]
    Net(#[from] NetError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Event fanned out to subscribers for every inbound wire message.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub wire: WireMessage,
    /// The persisted row. `None` only when local storage failed; the
    /// message is fanned out regardless so live views still update.
    pub stored: Option<StoredMessage>,
}

/// The live client engine. One per signed-in session.
pub struct SyncEngine {
    session: Session,
    db: Arc<Mutex<Database>>,
    registry: SubscriptionRegistry<InboundMessage>,
    channel: ChannelHandle,
    bridge: JoinHandle<()>,
}

impl SyncEngine {
    /// Spawn the channel and the inbound bridge for this session.
    pub fn start(config: &ClientConfig, session: Session, db: Database) -> Self {
        let db = Arc::new(Mutex::new(db));
        let registry = SubscriptionRegistry::new();

        let (channel, notif_rx) = spawn_channel(config.ws_url(session.user.id));

        let bridge = tokio::spawn(bridge_loop(db.clone(), registry.clone(), notif_rx));

        info!(user = session.user.id, "sync engine started");

        Self {
            session,
            db,
            registry,
            channel,
            bridge,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current channel state.
    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Observe channel state transitions.
    pub fn state_watch(&self) -> watch::Receiver<ChannelState> {
        self.channel.state_watch()
    }

    /// Register a callback for every inbound message.
    pub fn subscribe(
        &self,
        callback: impl Fn(&InboundMessage) + Send + Sync + 'static,
    ) -> Subscription<InboundMessage> {
        self.registry.subscribe(callback)
    }

    /// Send a text message on the live channel.
    ///
    /// Requires the channel to be open; otherwise the caller gets
    /// [`EngineError::Offline`] synchronously and nothing is queued.
    /// On success the message is also appended to the local store
    /// optimistically, with no acknowledgement to wait for; a storage
    /// failure at that point is logged, not surfaced, since the
    /// message did go out.
    pub fn send_message(
        &self,
        kind: ChatKind,
        target_id: i64,
        content: &str,
    ) -> Result<WireMessage, EngineError> {
        let user = &self.session.user;
        let message = match kind {
            ChatKind::User => WireMessage::direct(user.id, &user.username, target_id, content),
            ChatKind::Group => WireMessage::group(user.id, &user.username, target_id, content),
        };

        self.channel.send(message.clone()).map_err(|e| match e {
            NetError::NotConnected => EngineError::Offline,
            other => EngineError::Net(other),
        })?;

        if let Err(e) = self.lock_db().append_message(&message) {
            warn!(error = %e, "optimistic local append failed");
        }

        Ok(message)
    }

    /// Full history of one conversation, oldest first.
    ///
    /// Storage errors yield an empty history (logged), never an error.
    pub fn conversation(&self, partner_id: i64, kind: ChatKind) -> Vec<StoredMessage> {
        self.lock_db()
            .conversation(partner_id, kind, self.session.user.id)
            .unwrap_or_else(|e| {
                warn!(error = %e, partner = partner_id, "failed to load conversation");
                Vec::new()
            })
    }

    /// Flip one message's read flag; errors are logged and swallowed.
    pub fn mark_read(&self, message_id: i64) {
        if let Err(e) = self.lock_db().mark_read(message_id) {
            warn!(error = %e, id = message_id, "failed to mark message read");
        }
    }

    /// Mark every message of a loaded conversation as read.
    pub fn mark_conversation_read(&self, messages: &[StoredMessage]) {
        for message in messages {
            self.mark_read(message.id);
        }
    }

    /// Unread direct messages from `peer_id` to the signed-in user.
    ///
    /// A storage failure silently under-reports as zero: the unread
    /// badge favors availability over accuracy.
    pub fn unread_count(&self, peer_id: i64) -> u64 {
        unread_count(&self.db, peer_id, self.session.user.id)
    }

    /// The persisted current-conversation pointer, absent once expired.
    pub fn current_chat(&self) -> Option<ChatPointer> {
        self.lock_db().current_chat().unwrap_or_else(|e| {
            warn!(error = %e, "failed to load current-chat pointer");
            None
        })
    }

    pub fn set_current_chat(&self, chat: &ChatPointer) {
        if let Err(e) = self.lock_db().put_current_chat(chat) {
            warn!(error = %e, "failed to persist current-chat pointer");
        }
    }

    pub fn clear_current_chat(&self) {
        if let Err(e) = self.lock_db().clear_current_chat() {
            warn!(error = %e, "failed to clear current-chat pointer");
        }
    }

    /// Tear the engine down: close the channel, end its reconnect
    /// loop, and stop the bridge.
    pub fn shutdown(&self) {
        self.channel.shutdown();
    }

    pub(crate) fn db(&self) -> Arc<Mutex<Database>> {
        self.db.clone()
    }

    fn lock_db(&self) -> std::sync::MutexGuard<'_, Database> {
        self.db.lock().expect("database lock poisoned")
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.channel.shutdown();
        self.bridge.abort();
    }
}

/// Shared by the engine and the unread badge task.
pub(crate) fn unread_count(db: &Arc<Mutex<Database>>, peer_id: i64, self_id: i64) -> u64 {
    let db = db.lock().expect("database lock poisoned");
    db.count_unread(peer_id, self_id).unwrap_or_else(|e| {
        warn!(error = %e, peer = peer_id, "failed to count unread, reporting zero");
        0
    })
}

/// Inbound bridge: persist, then fan out.
async fn bridge_loop(
    db: Arc<Mutex<Database>>,
    registry: SubscriptionRegistry<InboundMessage>,
    mut notif_rx: mpsc::Receiver<ChannelNotification>,
) {
    while let Some(notification) = notif_rx.recv().await {
        match notification {
            ChannelNotification::Message(wire) => {
                // Persistence happens-before fan-out.
                let stored = {
                    let db = db.lock().expect("database lock poisoned");
                    db.append_message(&wire)
                };

                let stored = match stored {
                    Ok(stored) => Some(stored),
                    Err(e) => {
                        warn!(error = %e, "failed to persist inbound message");
                        None
                    }
                };

                registry.dispatch(&InboundMessage { wire, stored });
            }
            ChannelNotification::State(state) => {
                info!(state = ?state, "channel state changed");
            }
        }
    }

    info!("bridge loop ended");
}
