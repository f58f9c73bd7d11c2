//! Gas sensor limits.

use std::time::Duration;

use thiserror::Error;

/// Thresholds for the gas sensor reducer.
///
/// A reading above `max_allowed_ppm` starts an exceedance episode. An alert is
/// raised once the episode has lasted longer than `sustained_limit`, or
/// immediately for any reading at or above `spike_ppm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasLimits {
    /// Highest reading that is still acceptable.
    pub max_allowed_ppm: u32,
    /// How long a reading may stay above the limit before alerting.
    pub sustained_limit: Duration,
    /// Reading that alerts on sight.
    pub spike_ppm: u32,
}

impl GasLimits {
    pub const DEFAULT_MAX_ALLOWED_PPM: u32 = 50;
    pub const DEFAULT_SUSTAINED_LIMIT: Duration = Duration::from_secs(15 * 60);
    pub const DEFAULT_SPIKE_PPM: u32 = 200;

    /// Check that the spike threshold sits above the allowed reading.
    ///
    /// Spikes are only evaluated for over-limit readings, so a spike
    /// threshold at or below the limit could never fire on its own.
    pub fn validate(&self) -> Result<(), LimitsError> {
        if self.spike_ppm <= self.max_allowed_ppm {
            return Err(LimitsError::SpikeBelowLimit {
                spike_ppm: self.spike_ppm,
                max_allowed_ppm: self.max_allowed_ppm,
            });
        }
        Ok(())
    }
}

impl Default for GasLimits {
    fn default() -> Self {
        Self {
            max_allowed_ppm: Self::DEFAULT_MAX_ALLOWED_PPM,
            sustained_limit: Self::DEFAULT_SUSTAINED_LIMIT,
            spike_ppm: Self::DEFAULT_SPIKE_PPM,
        }
    }
}

/// Inconsistent gas limits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitsError {
    #[error("spike threshold {spike_ppm} ppm must be above the allowed reading {max_allowed_ppm} ppm")]
    SpikeBelowLimit { spike_ppm: u32, max_allowed_ppm: u32 },
}
