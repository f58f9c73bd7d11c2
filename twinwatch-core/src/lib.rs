//! # twinwatch-core
//!
//! Pure reducers for twinwatch entities. A reducer takes the current state of
//! one entity and an ordered batch of its messages and returns the next state
//! together with any alerts raised along the way.
//!
//! Reducers never touch the clock, storage or the network. The caller passes
//! the wall-clock time used for alert and incident timestamps, so replaying the
//! same batch from the same state always produces the same result.
//!
//! ## Example
//!
//! ```rust
//! use twinwatch_core::{GasLimits, GasSensorReducer, Reducer};
//! use twinwatch_types::{GasSensorMessage, GasSensorState, Millis};
//!
//! let reducer = GasSensorReducer::new(GasLimits::default());
//! let batch = [GasSensorMessage::new(250, Millis::from_secs(10))];
//!
//! let out = reducer
//!     .reduce(&GasSensorState::default(), &batch, Millis::from_secs(11))
//!     .unwrap();
//! assert_eq!(out.alerts.len(), 1);
//! assert!(out.state.alarm_sounded);
//! ```

use twinwatch_types::Millis;

pub mod error;
pub mod gas;
pub mod grid;
mod limits;

pub use error::ReduceError;
pub use gas::GasSensorReducer;
pub use grid::{AlertLevels, GridEvent, GridNodeReducer, ModerateRule, NoAlert};
pub use limits::{GasLimits, LimitsError};

/// Result of folding one batch over an entity's state.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction<S, A> {
    /// State after the last message.
    pub state: S,
    /// Alerts in the order they were raised.
    pub alerts: Vec<A>,
    /// Messages skipped because they could not be classified.
    pub skipped: usize,
}

/// A pure state transition for one entity kind.
///
/// Implementations must not mutate the input state. On error the caller keeps
/// its previous state and no alert from the batch is delivered.
pub trait Reducer: Send + Sync + 'static {
    type State: Default + Clone + Send + Sync + 'static;
    type Message: Send + Sync + 'static;
    type Alert: Clone + Send + Sync + 'static;

    /// Short name used in logs and reports.
    fn domain(&self) -> &'static str;

    fn reduce(
        &self,
        state: &Self::State,
        batch: &[Self::Message],
        now: Millis,
    ) -> Result<Reduction<Self::State, Self::Alert>, ReduceError>;
}
