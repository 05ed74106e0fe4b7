//! Notifications published by a running node.

use std::net::SocketAddr;

use brine_core::GossipValue;

/// Something observers of a node may care about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GossipEvent {
    /// A peer value passed duplicate and self-echo suppression.
    PeerValue {
        /// The decoded value.
        value: GossipValue,
        /// Datagram sender.
        from: SocketAddr,
        /// Sender address is one of this host's interfaces.
        from_local_host: bool,
    },

    /// The local estimate was stamped and fanned out.
    Announced {
        /// The estimate as sent.
        value: GossipValue,
        /// Size of the destination set it was sent to.
        destinations: usize,
    },
}

/// What became of one received datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Fed to the estimate engine.
    Accepted(GossipValue),
    /// Same peer address and timestamp as the previous message.
    Duplicate,
    /// Our own announce heard back.
    SelfEcho,
    /// Not a gossip value frame.
    Rejected(brine_core::CodecError),
}

/// Outcome of one announce cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnounceReport {
    /// The estimate as sent.
    pub value: GossipValue,
    /// Destinations in the rebuilt set.
    pub destinations: usize,
    /// Successful sends.
    pub sent: usize,
    /// Sends that returned an error.
    pub failed: usize,
    /// Loopback destinations the active policy does not announce to.
    pub skipped: usize,
}
