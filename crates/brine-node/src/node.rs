//! Gossip loop: the single task that owns a node's state.
//!
//! Everything mutable (estimate, peer filter, destination set) lives in
//! [`GossipNode`] and is only touched from [`GossipNode::run`], so no
//! locking is needed. Each iteration first sends any bootstrap or heartbeat
//! announce that is due, then waits on one bounded receive.

use std::net::SocketAddr;
use std::time::Instant;

use brine_core::{codec, now_seconds, GossipValue, Result, MAX_PAYLOAD};
use tokio::sync::broadcast;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::NodeConfig;
use crate::destinations::{self, Destination};
use crate::estimate::EstimateEngine;
use crate::events::{AnnounceReport, Disposition, GossipEvent};
use crate::filter::PeerFilter;
use crate::interfaces::InterfaceCatalog;
use crate::transport::Transport;

/// Buffered events per observer before the slowest one starts losing them.
const EVENT_CAPACITY: usize = 64;

/// A gossip-averaging node.
pub struct GossipNode<T, I> {
    source_id: u32,
    config: NodeConfig,
    engine: EstimateEngine,
    filter: PeerFilter,
    transport: T,
    interfaces: I,
    destinations: Vec<Destination>,
    events: broadcast::Sender<GossipEvent>,
    send_buf: Vec<u8>,
    last_announce: Option<Instant>,
}

impl<T: Transport, I: InterfaceCatalog> GossipNode<T, I> {
    /// Create a node. The configuration is validated first; a missing
    /// `source_id` is replaced by a random one.
    pub fn new(config: NodeConfig, transport: T, interfaces: I) -> Result<Self> {
        config.validate()?;

        let source_id = config.source_id.unwrap_or_else(rand::random);
        let engine = EstimateEngine::new(source_id, &config.estimate);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            source_id,
            config,
            engine,
            filter: PeerFilter::new(),
            transport,
            interfaces,
            destinations: Vec::new(),
            events,
            send_buf: Vec::with_capacity(MAX_PAYLOAD),
            last_announce: None,
        })
    }

    /// Identifier stamped on our announces.
    pub const fn source_id(&self) -> u32 {
        self.source_id
    }

    /// Current local estimate.
    pub const fn estimate(&self) -> &GossipValue {
        self.engine.estimate()
    }

    /// The estimate engine, for inspection.
    pub const fn engine(&self) -> &EstimateEngine {
        &self.engine
    }

    /// Destination set used by the most recent announce.
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// The underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Register an observer. Events are delivered best-effort.
    pub fn subscribe(&self) -> broadcast::Receiver<GossipEvent> {
        self.events.subscribe()
    }

    /// Run until `cancel` fires.
    ///
    /// Starts with one update (the seed, under accumulate and clamp) and an
    /// announce. Shutdown is observed within one poll timeout; a datagram
    /// already being handled finishes its announce first.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            source_id = self.source_id,
            policy = %self.engine.policy(),
            "gossip node started"
        );

        self.start().await;

        let poll_timeout = self.config.poll_timeout();
        let mut buf = vec![0u8; MAX_PAYLOAD];

        while !cancel.is_cancelled() {
            self.announce_if_due().await;

            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                polled = time::timeout(poll_timeout, self.transport.recv_from(&mut buf)) => polled,
            };

            match polled {
                Ok(Ok((len, from))) => {
                    self.handle_datagram(&buf[..len], from).await;
                }
                Ok(Err(e)) => debug!(error = %e, "receive failed"),
                Err(_) => trace!("poll timed out"),
            }
        }

        info!(
            source_id = self.source_id,
            estimate = self.engine.estimate().value,
            "gossip node stopped"
        );
    }

    /// Apply the initial update and announce it.
    pub async fn start(&mut self) -> AnnounceReport {
        let estimate = self.engine.update();
        debug!(estimate, "initial estimate");
        self.announce().await
    }

    /// Bootstrap and heartbeat announces, checked once per iteration.
    async fn announce_if_due(&mut self) {
        if self.engine.needs_bootstrap() || self.heartbeat_due() {
            self.announce().await;
        }
    }

    fn heartbeat_due(&self) -> bool {
        self.config.announce_interval().is_some_and(|every| {
            self.last_announce.map_or(true, |at| at.elapsed() >= every)
        })
    }

    /// Process one received datagram.
    ///
    /// Malformed frames and frames of another kind are discarded with a
    /// warning; duplicates and self-echoes are discarded quietly. An accepted
    /// value is published to observers, fed to the estimate engine, and
    /// triggers an announce.
    pub async fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr) -> Disposition {
        let value = match codec::decode(bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!(%from, error = %e, "discarding spurious message");
                return Disposition::Rejected(e);
            }
        };

        if !self.filter.accept(from.ip(), value.timestamp) {
            trace!(%from, timestamp = value.timestamp, "duplicate message");
            return Disposition::Duplicate;
        }

        if value.source_id == self.source_id {
            debug!(%from, "discarding our own announce");
            return Disposition::SelfEcho;
        }

        let from_local_host = self.interfaces.is_local_address(from.ip());

        if self.config.trace_incoming {
            info!(
                %from,
                source_id = value.source_id,
                value = value.value,
                timestamp = value.timestamp,
                from_local_host,
                "incoming gossip"
            );
        }

        self.notify(GossipEvent::PeerValue {
            value,
            from,
            from_local_host,
        });

        self.engine.record_peer(value);
        let estimate = self.engine.update();
        debug!(peer = value.value, estimate, "estimate updated");

        self.announce().await;
        Disposition::Accepted(value)
    }

    /// Stamp the current estimate and send it to every destination.
    ///
    /// The destination set is rebuilt from a fresh interface snapshot. A
    /// failed send is counted and logged; the remaining destinations are
    /// still tried.
    pub async fn announce(&mut self) -> AnnounceReport {
        self.destinations =
            destinations::build(&self.config.channels, &self.interfaces.list_interfaces());

        let value = self.engine.stamp(now_seconds());
        self.last_announce = Some(Instant::now());

        let mut report = AnnounceReport {
            value,
            destinations: self.destinations.len(),
            sent: 0,
            failed: 0,
            skipped: 0,
        };

        if let Err(e) = codec::encode(&value, &mut self.send_buf) {
            warn!(error = %e, "failed to encode estimate");
            return report;
        }

        self.notify(GossipEvent::Announced {
            value,
            destinations: report.destinations,
        });

        let announce_locally = self.engine.policy().announces_locally();
        for dst in &self.destinations {
            if dst.is_local && !announce_locally {
                report.skipped += 1;
                continue;
            }

            match self.transport.send_to(&self.send_buf, dst.socket_addr()).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    debug!(dst = %dst.socket_addr(), error = %e, "send failed");
                }
            }
        }

        debug!(
            value = value.value,
            sent = report.sent,
            failed = report.failed,
            "announced estimate"
        );

        report
    }

    fn notify(&self, event: GossipEvent) {
        // No observers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::UpdatePolicy;
    use crate::interfaces::{NetworkInterface, StaticInterfaces};
    use crate::transport::{MemoryInjector, MemoryTransport};
    use brine_core::BrineError;
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::time::Duration;
    use tokio_test::assert_ok;

    const PORT: u16 = 31100;
    const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);

    type TestNode = GossipNode<MemoryTransport, StaticInterfaces>;

    fn config(policy: UpdatePolicy) -> NodeConfig {
        let mut config = NodeConfig {
            source_id: Some(1),
            poll_timeout_ms: 20,
            ..NodeConfig::default()
        };
        config.channels.enable_loopback = true;
        config.channels.ports = vec![PORT];
        config.estimate.policy = policy;
        config
    }

    fn node_with(config: NodeConfig) -> (TestNode, MemoryInjector) {
        let (transport, injector) = MemoryTransport::pair();
        let interfaces = StaticInterfaces::new(vec![
            NetworkInterface::new("lo", Ipv4Addr::LOCALHOST, Ipv4Addr::UNSPECIFIED),
            NetworkInterface::new("eth1", LOCAL, Ipv4Addr::new(10, 0, 0, 255)),
        ]);
        let node = assert_ok!(GossipNode::new(config, transport, interfaces));
        (node, injector)
    }

    fn frame(source_id: u32, value: f64, timestamp: f64) -> Vec<u8> {
        let mut buf = Vec::new();
        codec::encode(
            &GossipValue::with_timestamp(source_id, value, timestamp),
            &mut buf,
        )
        .unwrap();
        buf
    }

    fn peer_addr() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::new(10, 0, 0, 9), PORT))
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[tokio::test]
    async fn test_seed_then_peer_then_duplicate() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::AccumulateClamp));

        let report = node.start().await;
        assert!(approx(node.estimate().value, 1.0));
        assert_eq!(report.destinations, 4);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.sent, 3);

        let bytes = frame(2, 5.0, 100.0);
        let disposition = node.handle_datagram(&bytes, peer_addr()).await;
        assert!(matches!(disposition, Disposition::Accepted(v) if v.source_id == 2));
        assert!(approx(node.estimate().value, 6.0));
        assert!(approx(node.engine().carried().unwrap().value, 0.0));

        let sent_before = node.transport().sent().len();
        let replay = node.handle_datagram(&bytes, peer_addr()).await;
        assert_eq!(replay, Disposition::Duplicate);
        assert!(approx(node.estimate().value, 6.0));
        assert_eq!(node.transport().sent().len(), sent_before);
    }

    #[tokio::test]
    async fn test_same_timestamp_from_another_peer_is_accepted() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::AccumulateClamp));
        node.start().await;

        let bytes = frame(2, 1.0, 100.0);
        node.handle_datagram(&bytes, peer_addr()).await;
        let other = SocketAddr::from((Ipv4Addr::new(10, 0, 0, 10), PORT));
        let disposition = node.handle_datagram(&bytes, other).await;
        assert!(matches!(disposition, Disposition::Accepted(_)));
        assert!(approx(node.estimate().value, 3.0));
    }

    #[tokio::test]
    async fn test_own_announce_is_not_applied() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::AccumulateClamp));
        node.start().await;
        node.transport().take_sent();

        let bytes = frame(node.source_id(), 4.0, 50.0);
        let disposition = node.handle_datagram(&bytes, peer_addr()).await;
        assert_eq!(disposition, Disposition::SelfEcho);
        assert!(approx(node.estimate().value, 1.0));
        assert!(node.transport().sent().is_empty());

        // The filter still saw it.
        let replay = node.handle_datagram(&bytes, peer_addr()).await;
        assert_eq!(replay, Disposition::Duplicate);
    }

    #[tokio::test]
    async fn test_garbage_is_rejected() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::AccumulateClamp));
        node.start().await;
        node.transport().take_sent();

        let disposition = node.handle_datagram(b"\xff\x00garbage", peer_addr()).await;
        assert!(matches!(disposition, Disposition::Rejected(_)));
        assert!(approx(node.estimate().value, 1.0));
        assert!(node.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_does_not_stop_fan_out() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::AccumulateClamp));
        node.transport()
            .fail_sends_to(SocketAddrV4::new(Ipv4Addr::new(224, 0, 75, 69), PORT));

        let report = node.announce().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 2);

        let targets: Vec<_> = node.transport().sent().into_iter().map(|(_, t)| t).collect();
        assert_eq!(
            targets,
            vec![
                SocketAddrV4::new(Ipv4Addr::BROADCAST, PORT),
                SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 255), PORT),
            ]
        );
    }

    #[tokio::test]
    async fn test_incremental_sum_announces_on_loopback() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::IncrementalSum));
        let report = node.start().await;
        assert_eq!(report.skipped, 0);
        assert_eq!(report.sent, 4);
        assert_eq!(
            node.transport().sent()[0].1,
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, PORT)
        );
        assert!(approx(node.estimate().value, 0.0));
    }

    #[tokio::test]
    async fn test_announce_payload_decodes_to_estimate() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::AccumulateClamp));
        let report = node.start().await;

        let (payload, _) = node.transport().sent()[0].clone();
        let decoded = codec::decode(&payload).unwrap();
        assert_eq!(decoded, report.value);
        assert_eq!(decoded.source_id, 1);
        assert!(approx(decoded.value, 1.0));
    }

    #[tokio::test]
    async fn test_announce_timestamps_increase() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::AccumulateClamp));
        let first = node.announce().await.value.timestamp;
        let second = node.announce().await.value.timestamp;
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_all_channels_disabled_sends_nothing() {
        let mut config = config(UpdatePolicy::IncrementalSum);
        config.channels.enable_loopback = false;
        config.channels.enable_multicast = false;
        config.channels.enable_broadcast = false;
        let (mut node, _injector) = node_with(config);

        let report = node.start().await;
        assert_eq!(report.destinations, 0);
        assert_eq!(report.sent, 0);
        assert!(node.destinations().is_empty());
        assert!(node.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::AccumulateClamp));
        let mut events = node.subscribe();

        node.start().await;
        let from_self = SocketAddr::from((LOCAL, PORT));
        node.handle_datagram(&frame(2, 2.0, 7.0), from_self).await;

        assert!(matches!(
            events.try_recv().unwrap(),
            GossipEvent::Announced { destinations: 4, .. }
        ));
        match events.try_recv().unwrap() {
            GossipEvent::PeerValue {
                value,
                from,
                from_local_host,
            } => {
                assert_eq!(value.source_id, 2);
                assert_eq!(from, from_self);
                assert!(from_local_host);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            events.try_recv().unwrap(),
            GossipEvent::Announced { value, .. } if approx(value.value, 3.0)
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_is_refused() {
        let (transport, _injector) = MemoryTransport::pair();
        let mut config = config(UpdatePolicy::AccumulateClamp);
        config.poll_timeout_ms = 0;
        let result = GossipNode::new(config, transport, StaticInterfaces::default());
        assert!(matches!(result, Err(BrineError::Config(_))));
    }

    #[tokio::test]
    async fn test_random_source_id_when_unset() {
        let mut config = config(UpdatePolicy::AccumulateClamp);
        config.source_id = None;
        let (node, _injector) = node_with(config);
        assert_eq!(node.estimate().source_id, node.source_id());
    }

    #[tokio::test]
    async fn test_run_processes_queued_datagrams_and_stops() {
        let (mut node, injector) = node_with(config(UpdatePolicy::AccumulateClamp));
        assert!(injector.inject(frame(2, 5.0, 100.0), peer_addr()));

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(150)).await;
            stopper.cancel();
        });

        time::timeout(Duration::from_secs(2), node.run(cancel))
            .await
            .expect("node did not stop after cancellation");
        assert!(approx(node.estimate().value, 6.0));
    }

    #[tokio::test]
    async fn test_idle_bootstrap_repeats_under_incremental_sum() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::IncrementalSum));
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(200)).await;
            stopper.cancel();
        });

        time::timeout(Duration::from_secs(2), node.run(cancel))
            .await
            .unwrap();
        // Initial announce plus at least one idle bootstrap.
        assert!(node.transport().sent().len() >= 8);
    }

    #[tokio::test]
    async fn test_idle_accumulate_node_stays_quiet() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::AccumulateClamp));
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(150)).await;
            stopper.cancel();
        });

        time::timeout(Duration::from_secs(2), node.run(cancel))
            .await
            .unwrap();
        assert_eq!(node.transport().sent().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_idle_poll_returns_within_poll_timeout() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::AccumulateClamp));
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        let cancelled_at = tokio::spawn(async move {
            // Lands partway through an idle 20 ms poll.
            time::sleep(Duration::from_millis(55)).await;
            let at = time::Instant::now();
            stopper.cancel();
            at
        });

        node.run(cancel).await;
        let stopped_at = time::Instant::now();
        let cancelled_at = cancelled_at.await.unwrap();
        assert!(stopped_at.duration_since(cancelled_at) < node.config.poll_timeout());
    }

    #[tokio::test]
    async fn test_trace_incoming_still_applies_value() {
        let mut config = config(UpdatePolicy::AccumulateClamp);
        config.trace_incoming = true;
        let (mut node, _injector) = node_with(config);
        let mut events = node.subscribe();
        node.start().await;

        let disposition = node.handle_datagram(&frame(2, 5.0, 100.0), peer_addr()).await;
        assert!(matches!(disposition, Disposition::Accepted(_)));
        assert!(approx(node.estimate().value, 6.0));

        let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert_eq!(kinds.len(), 3);
        assert!(matches!(
            kinds[1],
            GossipEvent::PeerValue { from_local_host: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_run_still_announces_once() {
        let (mut node, _injector) = node_with(config(UpdatePolicy::AccumulateClamp));
        let cancel = CancellationToken::new();
        cancel.cancel();
        node.run(cancel).await;
        assert_eq!(node.transport().sent().len(), 3);
    }
}
