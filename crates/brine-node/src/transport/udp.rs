//! UDP transport: binds the first free configured port and joins the
//! multicast group on every local interface.

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use brine_core::{BrineError, Result};

use super::Transport;
use crate::config::ChannelConfig;
use crate::interfaces::NetworkInterface;

/// Gossip socket shared by sending and receiving.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Open the gossip socket.
    ///
    /// Ports are tried in configuration order and the first one that binds
    /// wins. Binding is non-exclusive so several nodes on one host can share
    /// a port. Multicast group joins that fail (interfaces without multicast
    /// support) are logged and skipped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(channels: &ChannelConfig, interfaces: &[NetworkInterface]) -> Result<Self> {
        for &port in &channels.ports {
            match open_socket(port, channels, interfaces) {
                Ok(socket) => {
                    info!(
                        addr = %SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port),
                        group = %channels.multicast_address,
                        "listening for gossip"
                    );
                    return Ok(Self { socket });
                }
                Err(e) => {
                    debug!(port, error = %e, "port unavailable, trying next");
                }
            }
        }

        Err(BrineError::NoListenPort {
            ports: channels.ports.clone(),
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| BrineError::Transport(format!("local address: {e}")))
    }
}

fn open_socket(
    port: u16,
    channels: &ChannelConfig,
    interfaces: &[NetworkInterface],
) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_multicast_ttl_v4(channels.multicast_ttl)?;
    socket.set_multicast_loop_v4(false)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())?;

    for itf in interfaces {
        if let Err(e) = socket.join_multicast_v4(&channels.multicast_address, &itf.address) {
            debug!(
                interface = %itf.name,
                addr = %itf.address,
                error = %e,
                "could not join multicast group"
            );
        }
    }

    UdpSocket::from_std(socket.into())
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, payload: &[u8], target: SocketAddrV4) -> io::Result<()> {
        self.socket.send_to(payload, SocketAddr::V4(target)).await?;
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}
