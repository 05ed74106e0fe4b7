//! Destination set: where an announce is sent.
//!
//! Built fresh for every announce from the channel configuration and the
//! current interface snapshot, in a fixed order: loopback, multicast, the
//! limited broadcast address, then each interface's directed broadcast.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::config::ChannelConfig;
use crate::interfaces::NetworkInterface;

/// A single announce target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Destination {
    /// Target host.
    pub address: Ipv4Addr,
    /// Target port.
    pub port: u16,
    /// True for targets on this host (loopback channel).
    pub is_local: bool,
}

impl Destination {
    /// Socket address to send to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, self.port)
    }
}

/// Build the ordered destination list.
///
/// Interfaces that are loopback, have no broadcast address, or whose name
/// exactly matches an entry in `ignored_interfaces` are skipped during the
/// per-interface broadcast expansion. Interfaces sharing a broadcast address
/// contribute it once.
#[must_use]
pub fn build(channels: &ChannelConfig, interfaces: &[NetworkInterface]) -> Vec<Destination> {
    let mut dsts = Vec::new();

    let mut push = |address: Ipv4Addr, is_local: bool| {
        for &port in &channels.ports {
            let dst = Destination {
                address,
                port,
                is_local,
            };
            if !dsts.contains(&dst) {
                dsts.push(dst);
            }
        }
    };

    if channels.enable_loopback {
        push(Ipv4Addr::LOCALHOST, true);
    }

    if channels.enable_multicast {
        push(channels.multicast_address, false);
    }

    if channels.enable_broadcast {
        push(Ipv4Addr::BROADCAST, false);

        for itf in interfaces {
            if itf.is_loopback || itf.broadcast.is_unspecified() {
                continue;
            }
            if channels.ignored_interfaces.iter().any(|name| *name == itf.name) {
                continue;
            }
            push(itf.broadcast, false);
        }
    }

    dsts
}
