//! The live bidirectional channel to the server.
//!
//! The controller runs in a dedicated tokio task that exclusively owns
//! the WebSocket handle and the reconnect timer. External code talks to
//! it through a typed command channel and observes it through a
//! notification channel plus a state watch, keeping the networking
//! layer fully asynchronous and decoupled.
//!
//! State machine: `Idle -> Connecting -> Open -> Closed -> Connecting`
//! after a fixed 3-second delay. The retry is unconditional: no backoff
//! growth and no attempt cap, since the client is long-lived and the
//! server is assumed to become reachable eventually. Exactly one
//! connect attempt is made per close event.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use vicinity_shared::constants::RECONNECT_DELAY_SECS;
use vicinity_shared::WireMessage;

use crate::error::NetError;

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the controller task.
#[derive(Debug)]
enum ChannelCommand {
    /// Send one encoded frame, fire-and-forget.
    Send(WireMessage),
    /// Gracefully shut the controller down.
    Shutdown,
}

/// Notifications sent *from* the controller task to the application.
#[derive(Debug, Clone)]
pub enum ChannelNotification {
    /// The connection state changed.
    State(ChannelState),
    /// A wire message arrived and was decoded.
    Message(WireMessage),
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Never started (missing identity is a fatal configuration error).
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Handle through which the application drives the channel.
///
/// Cheap to clone; all clones talk to the same controller task.
#[derive(Clone)]
pub struct ChannelHandle {
    cmd_tx: mpsc::Sender<ChannelCommand>,
    state_rx: watch::Receiver<ChannelState>,
}

impl ChannelHandle {
    /// Send a message on the live channel.
    ///
    /// Rejected synchronously with [`NetError::NotConnected`] unless
    /// the channel is currently open. There is no internal queue for
    /// unsent messages: a message composed while offline is lost from
    /// the channel's perspective.
    pub fn send(&self, message: WireMessage) -> Result<(), NetError> {
        if *self.state_rx.borrow() != ChannelState::Open {
            return Err(NetError::NotConnected);
        }

        self.cmd_tx
            .try_send(ChannelCommand::Send(message))
            .map_err(|_| NetError::ChannelClosed)
    }

    /// Current connection state.
    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    /// A watch receiver that observes every state transition.
    pub fn state_watch(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Ask the controller to stop. The reconnect loop ends and the
    /// socket is closed; safe to call more than once.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.try_send(ChannelCommand::Shutdown);
    }
}

/// Spawn the channel controller task.
///
/// Returns the command handle and the notification stream. The caller
/// must already hold a resolved user identity; the URL is expected to
/// carry it (`ws://host/ws?user_id=<id>`).
pub fn spawn_channel(ws_url: String) -> (ChannelHandle, mpsc::Receiver<ChannelNotification>) {
    let (cmd_tx, cmd_rx) = mpsc::channel::<ChannelCommand>(64);
    let (notif_tx, notif_rx) = mpsc::channel::<ChannelNotification>(256);
    let (state_tx, state_rx) = watch::channel(ChannelState::Idle);

    tokio::spawn(controller_loop(ws_url, cmd_rx, notif_tx, state_tx));

    (ChannelHandle { cmd_tx, state_rx }, notif_rx)
}

async fn controller_loop(
    ws_url: String,
    mut cmd_rx: mpsc::Receiver<ChannelCommand>,
    notif_tx: mpsc::Sender<ChannelNotification>,
    state_tx: watch::Sender<ChannelState>,
) {
    let set_state = |state: ChannelState| {
        let _ = state_tx.send(state);
        let notif_tx = notif_tx.clone();
        async move {
            let _ = notif_tx.send(ChannelNotification::State(state)).await;
        }
    };

    loop {
        set_state(ChannelState::Connecting).await;
        info!(url = %ws_url, "connecting channel");

        match connect_async(&ws_url).await {
            Ok((ws, _response)) => {
                info!("channel open");
                set_state(ChannelState::Open).await;

                let (mut sink, mut stream) = ws.split();

                // Drive the socket until it errors or closes.
                loop {
                    tokio::select! {
                        cmd = cmd_rx.recv() => match cmd {
                            Some(ChannelCommand::Send(message)) => {
                                let frame = match message.to_json() {
                                    Ok(f) => f,
                                    Err(e) => {
                                        warn!(error = %e, "dropping unencodable outbound message");
                                        continue;
                                    }
                                };
                                if let Err(e) = sink.send(Message::Text(frame)).await {
                                    warn!(error = %e, "send failed, closing channel");
                                    break;
                                }
                            }
                            Some(ChannelCommand::Shutdown) | None => {
                                info!("channel shutdown requested");
                                let _ = sink.close().await;
                                set_state(ChannelState::Closed).await;
                                return;
                            }
                        },

                        frame = stream.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                match WireMessage::from_json(&text) {
                                    Ok(message) => {
                                        debug!(
                                            sender = message.sender_id,
                                            len = text.len(),
                                            "frame received"
                                        );
                                        let _ = notif_tx
                                            .send(ChannelNotification::Message(message))
                                            .await;
                                    }
                                    Err(e) => {
                                        warn!(error = %e, "dropping undecodable frame");
                                    }
                                }
                            }
                            Some(Ok(Message::Close(reason))) => {
                                info!(reason = ?reason, "server closed the channel");
                                break;
                            }
                            Some(Ok(_)) => {
                                // Ping/pong/binary frames carry no app data.
                            }
                            Some(Err(e)) => {
                                warn!(error = %e, "channel error");
                                break;
                            }
                            None => {
                                info!("channel stream ended");
                                break;
                            }
                        },
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
            }
        }

        set_state(ChannelState::Closed).await;

        if wait_for_reconnect(&mut cmd_rx).await {
            return;
        }
    }
}

/// Sleep out the fixed reconnect delay while still servicing commands.
///
/// Sends arriving here are rejected (the handle already refuses them
/// unless the observed state is open; this covers the race where a
/// send slipped in right before the close). Returns `true` on shutdown.
async fn wait_for_reconnect(cmd_rx: &mut mpsc::Receiver<ChannelCommand>) -> bool {
    let delay = tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS));
    tokio::pin!(delay);

    loop {
        tokio::select! {
            _ = &mut delay => return false,
            cmd = cmd_rx.recv() => match cmd {
                Some(ChannelCommand::Send(_)) => {
                    warn!("dropping message sent while disconnected");
                }
                Some(ChannelCommand::Shutdown) | None => {
                    info!("channel shutdown requested while disconnected");
                    return true;
                }
            },
        }
    }
}
