//! # twinwatch-host
//!
//! Runs twinwatch reducers against a live message stream.
//!
//! The host owns everything the reducers leave out: it keeps each entity's
//! state, serializes batches per entity while letting different entities run
//! in parallel, delivers alerts and snapshots state to disk.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use twinwatch_core::{GasLimits, GasSensorReducer};
//! use twinwatch_host::{Dispatcher, Envelope, Output};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let dispatcher = Dispatcher::builder(GasSensorReducer::new(GasLimits::default()))
//!         .output(Output::file("alerts.ndjson"))
//!         .build();
//!
//!     let (tx, rx) = mpsc::channel(1024);
//!     let handle = dispatcher.start(rx);
//!
//!     // Feed envelopes from any source
//!     # let message = twinwatch_types::GasSensorMessage::new(63, twinwatch_types::Millis::now());
//!     tx.send(Envelope::new("sensor-7", message)).await.unwrap();
//!
//!     drop(tx);
//!     handle.join().await;
//! }
//! ```
//!
//! ## Delivery
//!
//! An entity's new state is committed only after every output accepted the
//! alerts its batch raised. A failed batch leaves the state as it was, so
//! replaying it yields the same alerts (at-least-once delivery).

mod dispatcher;
mod envelope;
mod error;
mod output;
mod persist;
mod store;

pub use dispatcher::{
    DispatchHandle, DispatchOutcome, DispatchSummary, Dispatcher, DispatcherBuilder,
    DEFAULT_MAX_BATCH,
};
pub use envelope::{Delivery, Envelope};
pub use error::HostError;
pub use output::Output;
pub use persist::StateFile;
pub use store::{EntitySlot, EntityStore};
