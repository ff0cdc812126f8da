//! Radar-style peer placement.
//!
//! Each peer gets a 2-D position inside the container that avoids
//! overlapping other peers, and keeps that exact position across
//! refresh polls. Stability is a UX requirement: avatars must not
//! jump around every five seconds.

use std::collections::HashMap;

use rand::Rng;

use vicinity_shared::constants::{LAYOUT_PADDING, MIN_PEER_SEPARATION, PLACEMENT_ATTEMPTS};
use vicinity_shared::Peer;

/// A peer with its assigned container-local position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedPeer {
    pub peer: Peer,
    pub pos_x: f64,
    pub pos_y: f64,
}

/// Collision-avoiding position assignment with a per-peer side table.
///
/// The side table is keyed by peer id and outlives individual poll
/// results: a peer that disappears keeps its slot and resumes it when
/// it reappears. Retention is unbounded; see the eviction note in
/// DESIGN.md.
pub struct RadarLayout {
    width: f64,
    height: f64,
    slots: HashMap<i64, (f64, f64)>,
}

impl RadarLayout {
    /// Create a layout for a container of the given dimensions.
    ///
    /// The dimensions must be measured (non-zero) before any placement
    /// occurs; a zero-sized container returns `None`.
    pub fn new(width: f64, height: f64) -> Option<Self> {
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(Self {
            width,
            height,
            slots: HashMap::new(),
        })
    }

    /// Assign positions for the latest poll result.
    ///
    /// Peers with a remembered slot reuse it verbatim. New peers get
    /// up to 100 randomized candidates within the inset safe area; the
    /// first candidate far enough from every peer already placed this
    /// poll wins. When all attempts fail the last candidate is kept
    /// anyway: overlap is a degraded outcome, not an error.
    pub fn place(&mut self, peers: &[Peer]) -> Vec<PositionedPeer> {
        let mut rng = rand::thread_rng();
        let mut placed: Vec<(f64, f64)> = Vec::with_capacity(peers.len());
        let mut result = Vec::with_capacity(peers.len());

        for peer in peers {
            let position = match self.slots.get(&peer.id) {
                Some(&slot) => slot,
                None => {
                    let slot = self.pick_slot(&mut rng, &placed);
                    self.slots.insert(peer.id, slot);
                    slot
                }
            };

            placed.push(position);
            result.push(PositionedPeer {
                peer: peer.clone(),
                pos_x: position.0,
                pos_y: position.1,
            });
        }

        result
    }

    /// Number of remembered slots (placed peers, present or not).
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn pick_slot(&self, rng: &mut impl Rng, placed: &[(f64, f64)]) -> (f64, f64) {
        let (x_min, x_max) = safe_range(self.width);
        let (y_min, y_max) = safe_range(self.height);

        let mut candidate = (0.0, 0.0);
        for attempt in 0..PLACEMENT_ATTEMPTS {
            candidate = (rng.gen_range(x_min..x_max), rng.gen_range(y_min..y_max));

            let clear = placed
                .iter()
                .all(|&other| euclidean(candidate, other) >= MIN_PEER_SEPARATION);
            if clear {
                return candidate;
            }

            if attempt + 1 == PLACEMENT_ATTEMPTS {
                tracing::debug!("no non-overlapping slot found, accepting overlap");
            }
        }

        candidate
    }
}

/// Candidate range along one axis, inset by the border padding unless
/// the container is too small to afford it.
fn safe_range(extent: f64) -> (f64, f64) {
    if extent > 2.0 * LAYOUT_PADDING {
        (LAYOUT_PADDING, extent - LAYOUT_PADDING)
    } else {
        (0.0, extent)
    }
}

fn euclidean(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}
