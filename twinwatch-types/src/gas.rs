//! Gas sensor records.

use alloc::string::String;

use crate::Millis;

/// Persisted state of a single gas sensor.
///
/// `limit_start_time` is only meaningful while `limit_exceeded` is true. It is
/// written once per exceedance episode, on the transition from below the limit
/// to above it, and is left as-is when the episode ends.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GasSensorState {
    /// Most recent reading in parts per million.
    pub last_reading: u32,
    /// Device timestamp of the most recent reading.
    pub last_reading_time: Millis,
    /// Whether the sensor is currently above the allowed reading.
    pub limit_exceeded: bool,
    /// Set once an alert has been raised for this sensor.
    pub alarm_sounded: bool,
    /// Start of the current exceedance episode.
    pub limit_start_time: Millis,
    /// Number of exceedance episodes seen.
    pub event_count: u32,
}

impl GasSensorState {
    /// Create a sensor state with no readings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start of the current exceedance episode, if one is in progress.
    pub fn exceedance_started(&self) -> Option<Millis> {
        self.limit_exceeded.then_some(self.limit_start_time)
    }
}

/// One telemetry sample from a gas sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GasSensorMessage {
    /// Reading in parts per million.
    pub reading: u32,
    /// Device timestamp of the sample.
    pub timestamp: Millis,
}

impl GasSensorMessage {
    /// Create a sample.
    pub fn new(reading: u32, timestamp: Millis) -> Self {
        Self { reading, timestamp }
    }
}

/// Alert raised when a sensor reports dangerous air quality.
///
/// Serialized as a flat `{"message": ..., "timestamp": ...}` object.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GasAlert {
    /// Human-readable warning text.
    pub message: String,
    /// When the alert was raised.
    pub timestamp: Millis,
}

impl GasAlert {
    /// Text carried by every gas alert.
    pub const DANGEROUS_AIR_QUALITY: &'static str = "Warning: dangerous air quality.";

    /// Create the dangerous air quality alert.
    pub fn dangerous_air_quality(raised_at: Millis) -> Self {
        Self {
            message: String::from(Self::DANGEROUS_AIR_QUALITY),
            timestamp: raised_at,
        }
    }
}
