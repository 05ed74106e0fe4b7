//! The value each node announces and converges on.

use chrono::Utc;

/// A timestamped scalar estimate, tagged with the node that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GossipValue {
    /// The scalar being converged on.
    pub value: f64,

    /// Seconds since the Unix epoch at which the value was announced.
    /// Zero until the value is stamped for the first time.
    pub timestamp: f64,

    /// Identifier of the originating node.
    pub source_id: u32,
}

impl GossipValue {
    /// Create an unstamped value for the given node.
    #[must_use]
    pub const fn new(source_id: u32, value: f64) -> Self {
        Self {
            value,
            timestamp: 0.0,
            source_id,
        }
    }

    /// Create a value stamped with an explicit timestamp.
    #[must_use]
    pub const fn with_timestamp(source_id: u32, value: f64, timestamp: f64) -> Self {
        Self {
            value,
            timestamp,
            source_id,
        }
    }

    /// Stamp the value with `now`, keeping timestamps strictly increasing.
    ///
    /// If the clock has not moved past the previous stamp (coarse clock,
    /// clock stepped backwards) the previous stamp is bumped by one
    /// microsecond instead.
    pub fn stamp(&mut self, now: f64) {
        self.timestamp = if now > self.timestamp {
            now
        } else {
            self.timestamp + STAMP_STEP
        };
    }
}

/// Minimum increment between two stamps of the same value.
const STAMP_STEP: f64 = 1e-6;

/// Current wall-clock time in seconds since the Unix epoch.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Microsecond timestamps fit in f64's mantissa until year 2255.
pub fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
