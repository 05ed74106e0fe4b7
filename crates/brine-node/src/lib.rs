//! # brine-node
//!
//! A gossip-averaging node. Each node keeps one scalar estimate, announces it
//! over UDP (loopback, multicast, broadcast) and folds in the values its
//! peers announce, so that a group of nodes on a LAN converges on a shared
//! value without any coordinator.
//!
//! ## Pieces
//!
//! - [`config`]: TOML configuration and its validation
//! - [`interfaces`]: local IPv4 interface snapshots
//! - [`destinations`]: where an announce goes
//! - [`filter`]: per-peer duplicate suppression
//! - [`estimate`]: the update policies
//! - [`transport`]: UDP socket and an in-memory stand-in
//! - [`node`]: the loop tying it together
//!
//! ## Example
//!
//! ```rust,no_run
//! use brine_node::{GossipNode, InterfaceCatalog, NodeConfig, SystemInterfaces, UdpTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> brine_core::Result<()> {
//! let config = NodeConfig::default();
//! let interfaces = SystemInterfaces;
//! let transport = UdpTransport::bind(&config.channels, &interfaces.list_interfaces())?;
//!
//! let mut node = GossipNode::new(config, transport, interfaces)?;
//! node.run(CancellationToken::new()).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod destinations;
pub mod estimate;
pub mod events;
pub mod filter;
pub mod interfaces;
pub mod node;
pub mod transport;

pub use config::{ChannelConfig, EstimateConfig, NodeConfig};
pub use destinations::Destination;
pub use estimate::{EstimateEngine, UpdatePolicy};
pub use events::{AnnounceReport, Disposition, GossipEvent};
pub use filter::PeerFilter;
pub use interfaces::{InterfaceCatalog, NetworkInterface, StaticInterfaces, SystemInterfaces};
pub use node::GossipNode;
pub use transport::{MemoryInjector, MemoryTransport, Transport, UdpTransport};
