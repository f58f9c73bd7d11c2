//! # twinwatch-types
//!
//! Records shared by every twinwatch pipeline: the persisted state of each
//! tracked entity, the telemetry messages that drive it, and the alerts and
//! incident reports it produces.
//!
//! Two entity kinds exist:
//!
//! - **Gas sensors** ([`GasSensorState`], [`GasSensorMessage`], [`GasAlert`]):
//!   a single parts-per-million reading per sensor.
//! - **Grid nodes** ([`GridNodeState`], [`GridNodeMessage`],
//!   [`IncidentReport`]): a qualitative condition per power-grid node with
//!   derived alert level and incident counters.
//!
//! The types carry no decision logic. Classification lives in
//! `twinwatch-core`, which takes a state value and a batch of messages and
//! returns the next state.
//!
//! ## Features
//!
//! - `std` (default): Standard library support (enables [`Millis::now`])
//! - `serde`: JSON/etc. serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use twinwatch_types::{GridNodeMessage, IncidentHistory, IncidentReport, Millis, NodeCondition};
//!
//! let init = GridNodeMessage::init("23", "NW", "controller", 47.5404, 122.6362);
//! assert!(init.is_init());
//!
//! let mut history = IncidentHistory::new();
//! history.push(IncidentReport::new(Millis::from_secs(1), NodeCondition::Minor));
//! assert_eq!(history.len(), 1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod gas;
mod grid;
mod history;
mod timestamp;

pub use gas::*;
pub use grid::*;
pub use history::*;
pub use timestamp::*;
