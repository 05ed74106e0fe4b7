//! Node configuration for brine gossip nodes.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use brine_core::{BrineError, Result};

use crate::estimate::UpdatePolicy;

/// Configuration for a brine gossip node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identifier stamped on every announce (default: random per process).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<u32>,

    /// Upper bound on one receive poll, in milliseconds (default: 1000).
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Re-announce the current estimate this often even without traffic
    /// (seconds, 0 disables; default: 0).
    #[serde(default)]
    pub announce_interval_secs: u64,

    /// Log every accepted incoming value.
    #[serde(default)]
    pub trace_incoming: bool,

    /// Transport channels and ports.
    #[serde(default)]
    pub channels: ChannelConfig,

    /// Estimate update rule.
    #[serde(default)]
    pub estimate: EstimateConfig,
}

/// Which channels gossip is announced on, and where.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Announce on 127.0.0.1 (default: false).
    #[serde(default)]
    pub enable_loopback: bool,

    /// Announce to the multicast group (default: true).
    #[serde(default = "default_true")]
    pub enable_multicast: bool,

    /// Announce to 255.255.255.255 and every interface broadcast address
    /// (default: true).
    #[serde(default = "default_true")]
    pub enable_broadcast: bool,

    /// Destination ports; also the ports tried, in order, for listening.
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// Multicast group (default: 224.0.75.69).
    #[serde(default = "default_multicast_address")]
    pub multicast_address: Ipv4Addr,

    /// Multicast hop limit (default: 1, link-local only).
    #[serde(default = "default_multicast_ttl")]
    pub multicast_ttl: u32,

    /// Interface names excluded from per-interface broadcast.
    #[serde(default = "default_ignored_interfaces")]
    pub ignored_interfaces: Vec<String>,
}

/// Estimate engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateConfig {
    /// Update rule (default: `average_with_floor`).
    #[serde(default)]
    pub policy: UpdatePolicy,

    /// Magnitude at which the estimate stops growing (default: 10).
    #[serde(default = "default_max_delta")]
    pub max_acceptable_delta: f64,

    /// Local measurement used before any peer value arrives (default: 1).
    #[serde(default = "default_seed")]
    pub measured_seed_value: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            source_id: None,
            poll_timeout_ms: default_poll_timeout_ms(),
            announce_interval_secs: 0,
            trace_incoming: false,
            channels: ChannelConfig::default(),
            estimate: EstimateConfig::default(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enable_loopback: false,
            enable_multicast: true,
            enable_broadcast: true,
            ports: default_ports(),
            multicast_address: default_multicast_address(),
            multicast_ttl: default_multicast_ttl(),
            ignored_interfaces: default_ignored_interfaces(),
        }
    }
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            policy: UpdatePolicy::default(),
            max_acceptable_delta: default_max_delta(),
            measured_seed_value: default_seed(),
        }
    }
}

impl NodeConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| BrineError::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Check the configuration without touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.poll_timeout_ms == 0 {
            return Err(BrineError::Config("poll_timeout_ms must be positive".into()));
        }

        let channels = &self.channels;
        if channels.ports.is_empty() {
            return Err(BrineError::Config("at least one port is required".into()));
        }
        if channels.ports.contains(&0) {
            return Err(BrineError::Config("port 0 is not a valid destination".into()));
        }
        for (i, port) in channels.ports.iter().enumerate() {
            if channels.ports[..i].contains(port) {
                return Err(BrineError::Config(format!("duplicate port {port}")));
            }
        }
        if !channels.multicast_address.is_multicast() {
            return Err(BrineError::Config(format!(
                "{} is not a multicast address",
                channels.multicast_address
            )));
        }
        if channels.multicast_ttl == 0 {
            return Err(BrineError::Config("multicast_ttl must be positive".into()));
        }

        let estimate = &self.estimate;
        if !estimate.max_acceptable_delta.is_finite() || estimate.max_acceptable_delta <= 0.0 {
            return Err(BrineError::Config(format!(
                "max_acceptable_delta must be a positive number, got {}",
                estimate.max_acceptable_delta
            )));
        }
        if !estimate.measured_seed_value.is_finite() {
            return Err(BrineError::Config(
                "measured_seed_value must be a finite number".into(),
            ));
        }

        Ok(())
    }

    /// Bound on a single receive poll.
    #[must_use]
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Heartbeat period, if enabled.
    #[must_use]
    pub const fn announce_interval(&self) -> Option<Duration> {
        if self.announce_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.announce_interval_secs))
        }
    }
}

// Default value functions for serde.
const fn default_true() -> bool {
    true
}

const fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_ports() -> Vec<u16> {
    vec![31100, 31101, 31102, 31103, 31104]
}

const fn default_multicast_address() -> Ipv4Addr {
    Ipv4Addr::new(224, 0, 75, 69)
}

const fn default_multicast_ttl() -> u32 {
    1
}

fn default_ignored_interfaces() -> Vec<String> {
    vec![String::from("eth0:prv")]
}

const fn default_max_delta() -> f64 {
    10.0
}

const fn default_seed() -> f64 {
    1.0
}
