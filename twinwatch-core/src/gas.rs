//! Gas sensor reducer.
//!
//! Tracks exceedance episodes for a single parts-per-million reading and
//! raises [`GasAlert`]s for sustained or spiking readings.
//!
//! ## Elapsed time
//!
//! The sustained-limit check measures the episode length as a real
//! [`Duration`](std::time::Duration) between device timestamps (milliseconds)
//! and compares it with [`GasLimits::sustained_limit`]. Deployments replaying
//! data recorded by older firmware, which compared the raw millisecond gap
//! against the bare number 15, can reproduce that behaviour by configuring a
//! sustained limit of 15ms.

use twinwatch_types::{GasAlert, GasSensorMessage, GasSensorState, Millis};

use crate::{GasLimits, ReduceError, Reducer, Reduction};

/// Apply one sample to `state` and return the alert it raises, if any.
pub fn step(
    state: &mut GasSensorState,
    msg: &GasSensorMessage,
    limits: &GasLimits,
    now: Millis,
) -> Option<GasAlert> {
    state.last_reading = msg.reading;
    state.last_reading_time = msg.timestamp;

    if msg.reading <= limits.max_allowed_ppm {
        // The episode ends here; it is not counted as resolved.
        state.limit_exceeded = false;
        return None;
    }

    if !state.limit_exceeded {
        state.limit_exceeded = true;
        state.limit_start_time = msg.timestamp;
        state.event_count += 1;
    }

    let elapsed = state.last_reading_time.saturating_since(state.limit_start_time);
    let sustained = elapsed > limits.sustained_limit;
    let spike = msg.reading >= limits.spike_ppm;
    if !(sustained || spike) {
        return None;
    }

    state.alarm_sounded = true;
    tracing::debug!(
        reading = msg.reading,
        elapsed_ms = elapsed.as_millis() as u64,
        spike,
        "gas sensor alert"
    );
    Some(GasAlert::dangerous_air_quality(now))
}

/// Fold a batch of samples over `state` in arrival order.
///
/// Every sample is evaluated against the state left by the previous one, so a
/// batch of N over-limit samples can raise up to N alerts.
pub fn reduce(
    state: &GasSensorState,
    messages: &[GasSensorMessage],
    limits: &GasLimits,
    now: Millis,
) -> Reduction<GasSensorState, GasAlert> {
    let mut next = state.clone();
    let alerts = messages
        .iter()
        .filter_map(|msg| step(&mut next, msg, limits, now))
        .collect();

    Reduction {
        state: next,
        alerts,
        skipped: 0,
    }
}

/// [`Reducer`] for gas sensors.
#[derive(Debug, Clone, Default)]
pub struct GasSensorReducer {
    limits: GasLimits,
}

impl GasSensorReducer {
    /// Create a reducer with the given limits.
    pub fn new(limits: GasLimits) -> Self {
        Self { limits }
    }

    /// The limits in use.
    pub fn limits(&self) -> &GasLimits {
        &self.limits
    }
}

impl Reducer for GasSensorReducer {
    type State = GasSensorState;
    type Message = GasSensorMessage;
    type Alert = GasAlert;

    fn domain(&self) -> &'static str {
        "gas"
    }

    fn reduce(
        &self,
        state: &GasSensorState,
        batch: &[GasSensorMessage],
        now: Millis,
    ) -> Result<Reduction<GasSensorState, GasAlert>, ReduceError> {
        Ok(reduce(state, batch, &self.limits, now))
    }
}
