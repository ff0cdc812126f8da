//! Per-peer unread badge.
//!
//! Counts are derived from the store on demand rather than maintained
//! incrementally. A badge refreshes on spawn, on fan-out of a message
//! touching its peer, on the channel coming back up (to catch up after
//! a reconnect gap), and on a short fixed interval. The interval poll
//! is deliberate redundancy: the channel gives no delivery guarantee
//! and a subscription registered after a message arrived has already
//! missed it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use vicinity_net::ChannelState;
use vicinity_shared::constants::UNREAD_POLL_SECS;
use vicinity_shared::ChatKind;
use vicinity_store::Database;

use crate::engine::{unread_count, InboundMessage, SyncEngine};
use crate::subscriptions::Subscription;

/// Live unread count for one peer, published on a watch channel.
///
/// Dropping the badge aborts its refresh task and releases its
/// subscription.
pub struct UnreadBadge {
    count_rx: watch::Receiver<u64>,
    task: JoinHandle<()>,
    _subscription: Subscription<InboundMessage>,
}

impl UnreadBadge {
    /// Start tracking unread messages from `peer_id`.
    pub fn spawn(engine: &SyncEngine, peer_id: i64) -> Self {
        let self_id = engine.session().user.id;
        let db = engine.db();

        let (count_tx, count_rx) = watch::channel(unread_count(&db, peer_id, self_id));
        let (kick_tx, kick_rx) = mpsc::unbounded_channel();

        // Refresh whenever a direct message touches this peer, in
        // either direction.
        let subscription = engine.subscribe(move |inbound: &InboundMessage| {
            let touches_peer = inbound.wire.sender_id == peer_id
                || inbound.wire.receiver_id == Some(peer_id);
            let is_direct = matches!(inbound.wire.target(), Ok((ChatKind::User, _)));
            if touches_peer && is_direct {
                let _ = kick_tx.send(());
            }
        });

        let task = tokio::spawn(refresh_loop(
            db,
            peer_id,
            self_id,
            count_tx,
            kick_rx,
            engine.state_watch(),
        ));

        Self {
            count_rx,
            task,
            _subscription: subscription,
        }
    }

    /// Observe count changes.
    pub fn counts(&self) -> watch::Receiver<u64> {
        self.count_rx.clone()
    }

    /// Latest published count.
    pub fn current(&self) -> u64 {
        *self.count_rx.borrow()
    }
}

impl Drop for UnreadBadge {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn refresh_loop(
    db: Arc<Mutex<Database>>,
    peer_id: i64,
    self_id: i64,
    count_tx: watch::Sender<u64>,
    mut kick_rx: mpsc::UnboundedReceiver<()>,
    mut state_rx: watch::Receiver<ChannelState>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(UNREAD_POLL_SECS));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            kick = kick_rx.recv() => {
                if kick.is_none() {
                    // Subscription gone, the badge is being torn down.
                    return;
                }
            }
            _ = interval.tick() => {}
            changed = state_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                // Only a transition to open warrants a catch-up fetch.
                if *state_rx.borrow() != ChannelState::Open {
                    continue;
                }
            }
        }

        let count = unread_count(&db, peer_id, self_id);
        // Only wakes watchers when the value actually changed.
        count_tx.send_if_modified(|current| {
            if *current != count {
                *current = count;
                true
            } else {
                false
            }
        });
    }
}
