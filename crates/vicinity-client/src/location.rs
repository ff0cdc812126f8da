//! Location reporting with movement gating.
//!
//! The device position source is a black box that yields readings or
//! errors on a channel. While it works we stay in watch mode; on its
//! first error we degrade to coarse IP-based lookups and re-poll
//! periodically, never promoting back within the session. Every
//! candidate fix, whichever mode produced it, passes the movement gate
//! before a report goes to the directory, bounding update-call volume.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vicinity_net::{DirectoryClient, UserPatch};
use vicinity_shared::constants::{FALLBACK_LOCATION_POLL_SECS, MOVEMENT_THRESHOLD_METERS};
use vicinity_shared::geo::haversine_distance_m;
use vicinity_shared::LocationFix;

/// A position reading could not be produced.
#[derive(Error, Debug, Clone)]
pub enum PositionError {
    #[error("Position unavailable: {0}")]
    Unavailable(String),
}

/// Coarse location provider used once device positioning has failed.
pub trait FallbackLocator: Send + Sync + 'static {
    fn locate(&self) -> impl Future<Output = Result<LocationFix, PositionError>> + Send;
}

/// IP-derived location from the public `ipapi.co` endpoint, the same
/// degraded source the browser client falls back to.
#[derive(Clone, Default)]
pub struct IpApiLocator {
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct IpApiResponse {
    latitude: f64,
    longitude: f64,
}

impl FallbackLocator for IpApiLocator {
    fn locate(&self) -> impl Future<Output = Result<LocationFix, PositionError>> + Send {
        let http = self.http.clone();
        async move {
            let response: IpApiResponse = http
                .get("https://ipapi.co/json/")
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| PositionError::Unavailable(e.to_string()))?
                .json()
                .await
                .map_err(|e| PositionError::Unavailable(e.to_string()))?;

            Ok(LocationFix::new(response.latitude, response.longitude))
        }
    }
}

/// The movement gate: remembers the last reported fix and lets a new
/// one through only when the displacement is significant.
pub struct LocationReporter {
    threshold_m: f64,
    last_reported: Option<LocationFix>,
}

impl Default for LocationReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationReporter {
    pub fn new() -> Self {
        Self::with_threshold(MOVEMENT_THRESHOLD_METERS)
    }

    pub fn with_threshold(threshold_m: f64) -> Self {
        Self {
            threshold_m,
            last_reported: None,
        }
    }

    /// Decide whether `fix` should be reported.
    ///
    /// The very first fix always passes. On a pass the gate advances
    /// to `fix`, so observing the same position twice reports once.
    pub fn observe(&mut self, fix: LocationFix) -> bool {
        if let Some(last) = self.last_reported {
            if haversine_distance_m(last, fix) < self.threshold_m {
                return false;
            }
        }
        self.last_reported = Some(fix);
        true
    }

    pub fn last_reported(&self) -> Option<LocationFix> {
        self.last_reported
    }
}

/// Handle for the background reporter task.
///
/// Exposes the most recently reported position for consumers such as
/// the peer poller. Dropping the handle cancels the task.
pub struct ReporterHandle {
    position_rx: watch::Receiver<LocationFix>,
    task: JoinHandle<()>,
}

impl ReporterHandle {
    /// Last position accepted by the directory, seeded from the
    /// profile until the first successful report.
    pub fn position(&self) -> watch::Receiver<LocationFix> {
        self.position_rx.clone()
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Watch,
    Fallback,
}

/// Spawn the location reporter.
///
/// `readings` is the device position source; `initial` is the position
/// already on the profile.
pub fn spawn_location_reporter<F: FallbackLocator>(
    directory: DirectoryClient,
    user_id: i64,
    initial: LocationFix,
    readings: mpsc::Receiver<Result<LocationFix, PositionError>>,
    fallback: F,
) -> ReporterHandle {
    let (position_tx, position_rx) = watch::channel(initial);

    let task = tokio::spawn(reporter_loop(
        directory,
        user_id,
        readings,
        fallback,
        position_tx,
    ));

    ReporterHandle { position_rx, task }
}

async fn reporter_loop<F: FallbackLocator>(
    directory: DirectoryClient,
    user_id: i64,
    mut readings: mpsc::Receiver<Result<LocationFix, PositionError>>,
    fallback: F,
    position_tx: watch::Sender<LocationFix>,
) {
    let mut gate = LocationReporter::new();
    let mut mode = Mode::Watch;
    let mut fallback_polled = false;

    loop {
        let candidate = match mode {
            Mode::Watch => match readings.recv().await {
                Some(Ok(fix)) => Some(fix),
                Some(Err(e)) => {
                    // Once degraded we stay degraded for the session.
                    warn!(error = %e, "device positioning failed, degrading to IP fallback");
                    mode = Mode::Fallback;
                    continue;
                }
                None => {
                    info!("position source ended, degrading to IP fallback");
                    mode = Mode::Fallback;
                    continue;
                }
            },
            Mode::Fallback => {
                if fallback_polled {
                    tokio::time::sleep(Duration::from_secs(FALLBACK_LOCATION_POLL_SECS)).await;
                }
                fallback_polled = true;

                match fallback.locate().await {
                    Ok(fix) => Some(fix),
                    Err(e) => {
                        // Terminal for this poll: no location available,
                        // peer discovery stays blocked upstream.
                        warn!(error = %e, "no location available");
                        None
                    }
                }
            }
        };

        let Some(fix) = candidate else { continue };

        if !gate.observe(fix) {
            continue;
        }

        match directory
            .update_user(&UserPatch::location(user_id, fix.latitude, fix.longitude))
            .await
        {
            Ok(_) => {
                debug!(
                    lat = fix.latitude,
                    long = fix.longitude,
                    "location reported"
                );
                let _ = position_tx.send(fix);
            }
            Err(e) => {
                warn!(error = %e, "failed to report location");
            }
        }
    }
}
