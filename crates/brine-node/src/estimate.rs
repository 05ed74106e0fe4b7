//! Estimate engine: the local belief and the rule that moves it.
//!
//! Two update policies are supported:
//!
//! - **Incremental sum** (`sum_then_announce`): every accepted peer message
//!   steps the estimate by +1 while `|estimate| < max_delta`. The peer's
//!   value is not used, only the fact that one arrived.
//! - **Accumulate and clamp** (`average_with_floor`): before any peer value
//!   arrives the estimate is the measured seed. Afterwards, while
//!   `|estimate| < max_delta` the carried peer value is added and then zeroed
//!   so it contributes once; at or past the bound the estimate is pinned to
//!   exactly `max_delta`.
//!
//! The magnitude test is always on the local estimate, never the peer's
//! value, so a local estimate below `-max_delta` also stops growing (and is
//! pinned to `+max_delta` under accumulate and clamp).

use std::fmt;
use std::str::FromStr;

use brine_core::GossipValue;
use serde::{Deserialize, Serialize};

use crate::config::EstimateConfig;

/// Rule applied when a peer value is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdatePolicy {
    /// +1 per accepted message, announced to local and external destinations.
    #[serde(rename = "sum_then_announce")]
    IncrementalSum,
    /// Seed, then add-and-consume peer values, saturating at `max_delta`.
    /// Announced to external destinations only.
    #[default]
    #[serde(rename = "average_with_floor")]
    AccumulateClamp,
}

impl UpdatePolicy {
    /// Configuration name of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IncrementalSum => "sum_then_announce",
            Self::AccumulateClamp => "average_with_floor",
        }
    }

    /// True if announces are also sent to loopback destinations.
    #[must_use]
    pub const fn announces_locally(self) -> bool {
        matches!(self, Self::IncrementalSum)
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum_then_announce" | "incremental-sum" => Ok(Self::IncrementalSum),
            "average_with_floor" | "accumulate-clamp" => Ok(Self::AccumulateClamp),
            other => Err(format!(
                "unknown update policy '{other}' (expected sum_then_announce or average_with_floor)"
            )),
        }
    }
}

/// Owns the local estimate and applies the configured update policy.
#[derive(Debug, Clone)]
pub struct EstimateEngine {
    policy: UpdatePolicy,
    max_delta: f64,
    seed: f64,
    estimate: GossipValue,
    /// Last accepted peer value; its `value` is zeroed once consumed.
    carried: Option<GossipValue>,
    /// A peer value was recorded and no update has run since.
    pending: bool,
}

impl EstimateEngine {
    /// Create an engine whose estimate starts at zero.
    #[must_use]
    pub const fn new(source_id: u32, config: &EstimateConfig) -> Self {
        Self {
            policy: config.policy,
            max_delta: config.max_acceptable_delta,
            seed: config.measured_seed_value,
            estimate: GossipValue::new(source_id, 0.0),
            carried: None,
            pending: false,
        }
    }

    /// Current local estimate.
    #[must_use]
    pub const fn estimate(&self) -> &GossipValue {
        &self.estimate
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> UpdatePolicy {
        self.policy
    }

    /// Last accepted peer value, as left after consumption.
    #[must_use]
    pub const fn carried(&self) -> Option<&GossipValue> {
        self.carried.as_ref()
    }

    /// Remember an accepted peer value for the next [`update`](Self::update).
    pub fn record_peer(&mut self, peer: GossipValue) {
        self.carried = Some(peer);
        self.pending = true;
    }

    /// Apply the update rule and return the new estimate.
    pub fn update(&mut self) -> f64 {
        let pending = std::mem::take(&mut self.pending);
        let within_bound = self.estimate.value.abs() < self.max_delta;

        match self.policy {
            UpdatePolicy::IncrementalSum => {
                if pending && within_bound {
                    self.estimate.value += 1.0;
                }
            }
            UpdatePolicy::AccumulateClamp => match self.carried.as_mut() {
                None => self.estimate.value = self.seed,
                Some(peer) if within_bound => {
                    self.estimate.value += peer.value;
                    peer.value = 0.0;
                }
                Some(_) => self.estimate.value = self.max_delta,
            },
        }

        self.estimate.value
    }

    /// True while an incremental-sum node has nothing to say but zero,
    /// and must announce on its own to get the exchange started.
    #[must_use]
    #[allow(clippy::float_cmp)] // Exactly zero is the unset sentinel.
    pub fn needs_bootstrap(&self) -> bool {
        self.policy == UpdatePolicy::IncrementalSum && self.estimate.value == 0.0
    }

    /// Stamp the estimate for sending and return a copy of it.
    pub fn stamp(&mut self, now: f64) -> GossipValue {
        self.estimate.stamp(now);
        self.estimate
    }
}
