//! # twinwatch
//!
//! Command-line host for the twinwatch reducers: feeds newline-delimited JSON
//! telemetry for gas sensors or grid nodes through the matching reducer,
//! delivers alerts and keeps per-entity state between runs.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   envelopes   ┌────────────┐  batch per id  ┌─────────┐
//! │  source  │──────────────▶│ dispatcher │───────────────▶│ reducer │
//! │ file/tcp │               │   (host)   │◀───────────────│ (core)  │
//! └──────────┘               └─────┬──────┘ state + alerts └─────────┘
//!                                  │
//!                      ┌───────────┴───────────┐
//!                      ▼                       ▼
//!                 alert output            state file
//! ```
//!
//! - **[`source`]**: reads envelopes from a file, a TCP stream or stdin
//! - **[`pipeline`]**: wires a source, a dispatcher and the outputs for one run
//! - **[`config`]**: settings from a TOML file and `TWINWATCH__*` variables
//! - **[`report`]**: the `--export` summary
//!
//! ## Usage
//!
//! ```bash
//! # Gas sensors from a file, alerts appended to alerts.ndjson
//! twinwatch gas --input readings.ndjson --alerts alerts.ndjson
//!
//! # Grid nodes from a TCP feed, state kept across runs
//! twinwatch grid --connect localhost:7000 --state grid-state.json
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::io::Cursor;
//! use twinwatch::pipeline::{run, RunOptions};
//! use twinwatch_core::GridNodeReducer;
//!
//! # tokio_test::block_on(async {
//! let input = r#"{"id":"23","message":{"type":"status","condition":"minor"}}"#;
//! let result = run(GridNodeReducer, Cursor::new(input), "example", &RunOptions::default())
//!     .await
//!     .unwrap();
//! assert_eq!(result.states["23"].minor_count, 1);
//! # });
//! ```

pub mod config;
pub mod duration;
pub mod pipeline;
pub mod report;
pub mod source;

pub use config::Settings;
pub use pipeline::{run, RunOptions, RunResult};
pub use report::ExportReport;
pub use source::{Input, LineStats, StreamSource};
