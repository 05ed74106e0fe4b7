//! Local network interface catalog.
//!
//! Topology can change while a node runs (DHCP renewals, links coming up),
//! so nothing here caches: every announce asks for a fresh snapshot.

use std::net::{IpAddr, Ipv4Addr};

use if_addrs::IfAddr;
use tracing::warn;

/// One IPv4 address bound to a local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    /// Interface name as reported by the OS (e.g. `eth0`, `eth0:prv`).
    pub name: String,
    /// Unicast address.
    pub address: Ipv4Addr,
    /// Directed broadcast address, or `0.0.0.0` if the link has none.
    pub broadcast: Ipv4Addr,
    /// True for loopback interfaces.
    pub is_loopback: bool,
}

impl NetworkInterface {
    /// Build an interface entry, deriving the loopback flag from the address.
    #[must_use]
    pub fn new(name: impl Into<String>, address: Ipv4Addr, broadcast: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            address,
            broadcast,
            is_loopback: address.is_loopback(),
        }
    }
}

/// Source of local interface snapshots.
pub trait InterfaceCatalog: Send + Sync {
    /// Current IPv4 interfaces. Returns an empty list if the query fails.
    fn list_interfaces(&self) -> Vec<NetworkInterface>;

    /// True if `addr` belongs to one of this host's interfaces.
    fn is_local_address(&self, addr: IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => self
                .list_interfaces()
                .iter()
                .any(|itf| itf.address == v4),
            IpAddr::V6(_) => false,
        }
    }
}

/// Interfaces of the running host, queried through the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceCatalog for SystemInterfaces {
    fn list_interfaces(&self) -> Vec<NetworkInterface> {
        match if_addrs::get_if_addrs() {
            Ok(interfaces) => interfaces
                .into_iter()
                .filter_map(|itf| {
                    let is_loopback = itf.is_loopback();
                    match itf.addr {
                        IfAddr::V4(v4) => Some(NetworkInterface {
                            name: itf.name,
                            address: v4.ip,
                            broadcast: v4.broadcast.unwrap_or(Ipv4Addr::UNSPECIFIED),
                            is_loopback,
                        }),
                        IfAddr::V6(_) => None,
                    }
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "failed to enumerate network interfaces");
                Vec::new()
            }
        }
    }
}

/// A fixed interface snapshot, for embedding hosts that manage topology
/// themselves and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces {
    interfaces: Vec<NetworkInterface>,
}

impl StaticInterfaces {
    /// Wrap a fixed list of interfaces.
    #[must_use]
    pub const fn new(interfaces: Vec<NetworkInterface>) -> Self {
        Self { interfaces }
    }
}

impl InterfaceCatalog for StaticInterfaces {
    fn list_interfaces(&self) -> Vec<NetworkInterface> {
        self.interfaces.clone()
    }
}
