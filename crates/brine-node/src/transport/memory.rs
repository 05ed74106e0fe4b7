//! In-process transport.
//!
//! Sends are recorded instead of hitting the network, and receives are fed
//! from a [`MemoryInjector`]. Once every injector is dropped, receives
//! never complete, which looks like a silent network to the gossip loop.

use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

use super::Transport;

type Datagram = (Vec<u8>, SocketAddr);

/// Transport backed by in-memory queues.
#[derive(Debug)]
pub struct MemoryTransport {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
    sent: Mutex<Vec<(Vec<u8>, SocketAddrV4)>>,
    unreachable: Mutex<HashSet<SocketAddrV4>>,
}

/// Feeds datagrams into a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct MemoryInjector {
    tx: mpsc::UnboundedSender<Datagram>,
}

impl MemoryInjector {
    /// Queue a datagram as if it arrived from `from`.
    ///
    /// Returns false if the transport has been dropped.
    pub fn inject(&self, payload: impl Into<Vec<u8>>, from: SocketAddr) -> bool {
        self.tx.send((payload.into(), from)).is_ok()
    }
}

impl MemoryTransport {
    /// Create a transport and the injector that feeds it.
    #[must_use]
    pub fn pair() -> (Self, MemoryInjector) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            inbound: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            unreachable: Mutex::new(HashSet::new()),
        };
        (transport, MemoryInjector { tx })
    }

    /// Make every send to `target` fail.
    pub fn fail_sends_to(&self, target: SocketAddrV4) {
        self.unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target);
    }

    /// Datagrams sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddrV4)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the record of sent datagrams.
    pub fn take_sent(&self) -> Vec<(Vec<u8>, SocketAddrV4)> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_to(&self, payload: &[u8], target: SocketAddrV4) -> io::Result<()> {
        let unreachable = self
            .unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&target);
        if unreachable {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{target} is unreachable"),
            ));
        }

        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((payload.to_vec(), target));
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some((payload, from)) => {
                // Oversized datagrams are truncated, as a UDP socket would.
                let len = payload.len().min(buf.len());
                buf[..len].copy_from_slice(&payload[..len]);
                Ok((len, from))
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr(port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), port)
    }

    #[tokio::test]
    async fn test_records_sends() {
        let (transport, _injector) = MemoryTransport::pair();
        transport.send_to(b"a", addr(1)).await.unwrap();
        transport.send_to(b"b", addr(2)).await.unwrap();

        let sent = transport.take_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], (b"b".to_vec(), addr(2)));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_target() {
        let (transport, _injector) = MemoryTransport::pair();
        transport.fail_sends_to(addr(1));
        let err = transport.send_to(b"a", addr(1)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrNotAvailable);
        assert!(transport.send_to(b"a", addr(2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_datagram_is_received() {
        let (transport, injector) = MemoryTransport::pair();
        assert!(injector.inject(b"hello".to_vec(), SocketAddr::V4(addr(9))));

        let mut buf = [0u8; 3];
        let (len, from) = transport.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(from, SocketAddr::V4(addr(9)));
    }

    #[tokio::test]
    async fn test_silent_after_injectors_dropped() {
        let (transport, injector) = MemoryTransport::pair();
        drop(injector);
        let mut buf = [0u8; 8];
        let polled = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            transport.recv_from(&mut buf),
        )
        .await;
        assert!(polled.is_err());
    }
}
