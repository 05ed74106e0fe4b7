//! Duplicate suppression for inbound gossip.
//!
//! Remembers the last timestamp seen from each peer address. A message is
//! a duplicate only if its timestamp equals the stored one;
//! older timestamps still count as new, since reordering is expected on a
//! best-effort transport.

use std::collections::HashMap;
use std::net::IpAddr;

/// Per-peer last-seen timestamps.
#[derive(Debug, Default)]
pub struct PeerFilter {
    last_seen: HashMap<IpAddr, f64>,
}

impl PeerFilter {
    /// Create an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `timestamp` for `peer`, returning false if it repeats the
    /// previous message from that peer.
    #[allow(clippy::float_cmp)] // Stamps are copied, never computed, so equality is exact.
    pub fn accept(&mut self, peer: IpAddr, timestamp: f64) -> bool {
        self.last_seen
            .insert(peer, timestamp)
            .map_or(true, |previous| previous != timestamp)
    }

    /// Last timestamp recorded for `peer`.
    #[must_use]
    pub fn last_seen(&self, peer: IpAddr) -> Option<f64> {
        self.last_seen.get(&peer).copied()
    }

    /// Drop the record for `peer`, so its next message is accepted.
    pub fn forget(&mut self, peer: IpAddr) -> bool {
        self.last_seen.remove(&peer).is_some()
    }

    /// Number of peers tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    /// True if no peer has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}
