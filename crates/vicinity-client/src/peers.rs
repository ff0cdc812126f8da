//! Nearby-peer polling.
//!
//! An independent loop that asks the directory for peers around the
//! user's last known position every few seconds and runs the result
//! through the radar layout. It does not depend on the channel: peer
//! discovery works while chat is offline.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use vicinity_net::DirectoryClient;
use vicinity_shared::constants::{DEFAULT_RADIUS_KM, PEER_REFRESH_SECS};
use vicinity_shared::LocationFix;

use crate::layout::{PositionedPeer, RadarLayout};

/// Handle for the peer polling task. Publishes positioned peers on a
/// watch channel; dropping the handle cancels the poll loop.
pub struct PeerRadar {
    peers_rx: watch::Receiver<Vec<PositionedPeer>>,
    task: JoinHandle<()>,
}

impl PeerRadar {
    /// Start polling around the position observed on `position_rx`
    /// (typically fed by the location reporter).
    pub fn spawn(
        directory: DirectoryClient,
        self_id: i64,
        position_rx: watch::Receiver<LocationFix>,
        layout: RadarLayout,
    ) -> Self {
        let (peers_tx, peers_rx) = watch::channel(Vec::new());

        let task = tokio::spawn(poll_loop(directory, self_id, position_rx, layout, peers_tx));

        Self { peers_rx, task }
    }

    /// Observe every refresh of the positioned peer list.
    pub fn peers(&self) -> watch::Receiver<Vec<PositionedPeer>> {
        self.peers_rx.clone()
    }
}

impl Drop for PeerRadar {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn poll_loop(
    directory: DirectoryClient,
    self_id: i64,
    position_rx: watch::Receiver<LocationFix>,
    mut layout: RadarLayout,
    peers_tx: watch::Sender<Vec<PositionedPeer>>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(PEER_REFRESH_SECS));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let position = *position_rx.borrow();
        match directory
            .nearby_users(
                position.latitude,
                position.longitude,
                DEFAULT_RADIUS_KM,
                self_id,
            )
            .await
        {
            Ok(peers) => {
                debug!(count = peers.len(), "peer refresh");
                let _ = peers_tx.send(layout.place(&peers));
            }
            Err(e) => {
                // Keep showing the previous result; the next tick retries.
                warn!(error = %e, "peer discovery failed");
            }
        }
    }
}
