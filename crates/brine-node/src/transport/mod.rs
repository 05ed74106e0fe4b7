//! Datagram transport used by the gossip loop.
//!
//! - **Udp**: the production transport, a non-exclusive UDP socket with
//!   multicast and broadcast enabled.
//! - **Memory**: an in-process transport that records sends and replays
//!   injected datagrams.

pub mod memory;
pub mod udp;

use async_trait::async_trait;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};

pub use memory::{MemoryInjector, MemoryTransport};
pub use udp::UdpTransport;

/// Best-effort datagram transport.
///
/// Receives are unbounded here; the gossip loop bounds each one with its
/// poll timeout.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one datagram to `target`.
    async fn send_to(&self, payload: &[u8], target: SocketAddrV4) -> io::Result<()>;

    /// Wait for the next datagram, returning its length and sender.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}
