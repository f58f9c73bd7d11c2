//! Wall-clock timestamps for telemetry and alerts.
//!
//! Milliseconds since the Unix epoch are the canonical unit, matching what
//! devices put on the wire.

use core::time::Duration;

/// Milliseconds since the Unix epoch.
///
/// Subtraction between two timestamps yields a [`Duration`], so limits are
/// always compared in real time units rather than in raw counter ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Millis(pub u64);

impl Millis {
    /// The Unix epoch.
    pub const EPOCH: Millis = Millis(0);

    /// Create from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Create from seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1000)
    }

    /// Get the value in milliseconds.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is in the future.
    pub const fn saturating_since(&self, earlier: Millis) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    /// This timestamp moved forward by `d` (saturating).
    pub fn saturating_add(&self, d: Duration) -> Millis {
        let millis = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        Millis(self.0.saturating_add(millis))
    }

    /// The current wall-clock time.
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| Millis(d.as_millis() as u64))
            .unwrap_or(Millis::EPOCH)
    }
}

impl From<u64> for Millis {
    fn from(millis: u64) -> Self {
        Self(millis)
    }
}

impl From<Millis> for u64 {
    fn from(m: Millis) -> Self {
        m.0
    }
}
