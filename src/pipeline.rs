//! One run of a pipeline: read envelopes, dispatch them, persist the result.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use twinwatch_core::Reducer;
use twinwatch_host::{
    Delivery, DispatchSummary, Dispatcher, EntityStore, Output, StateFile, DEFAULT_MAX_BATCH,
};

use crate::config::DEFAULT_CHANNEL_CAPACITY;
use crate::source::{LineStats, StreamSource};

/// Capacity of the channel feeding alerts to stdout.
const STDOUT_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Append alerts to this file; stdout otherwise.
    pub alerts: Option<PathBuf>,
    /// Load entity state from and save it back to this file.
    pub state: Option<PathBuf>,
    pub max_batch: usize,
    pub channel_capacity: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            alerts: None,
            state: None,
            max_batch: DEFAULT_MAX_BATCH,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// What a finished run leaves behind.
#[derive(Debug, Clone)]
pub struct RunResult<S> {
    pub summary: DispatchSummary,
    pub lines: LineStats,
    pub states: BTreeMap<String, S>,
}

/// Run `reducer` over every envelope in `input` until it ends.
pub async fn run<R, I>(
    reducer: R,
    input: I,
    description: &str,
    opts: &RunOptions,
) -> Result<RunResult<R::State>>
where
    R: Reducer,
    R::State: Serialize + DeserializeOwned,
    R::Message: DeserializeOwned,
    R::Alert: Serialize,
    I: AsyncRead + Unpin + Send + 'static,
{
    run_with_stdout(reducer, input, description, opts, tokio::io::stdout()).await
}

async fn run_with_stdout<R, I, W>(
    reducer: R,
    input: I,
    description: &str,
    opts: &RunOptions,
    stdout: W,
) -> Result<RunResult<R::State>>
where
    R: Reducer,
    R::State: Serialize + DeserializeOwned,
    R::Message: DeserializeOwned,
    R::Alert: Serialize,
    I: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let domain = reducer.domain();
    let state_file = opts.state.as_ref().map(StateFile::new);

    let store = match &state_file {
        Some(file) => {
            let states = file
                .load()
                .await
                .with_context(|| format!("failed to load {}", file.path().display()))?;
            tracing::info!(domain, entities = states.len(), "loaded state");
            EntityStore::from_states(states)
        }
        None => EntityStore::new(),
    };

    let builder = Dispatcher::builder(reducer)
        .store(Arc::new(store))
        .max_batch(opts.max_batch);
    let (builder, printer) = match &opts.alerts {
        Some(path) => (builder.output(Output::file(path)), None),
        None => {
            let (output, rx) = Output::channel(STDOUT_BUFFER);
            (builder.output(output), Some(tokio::spawn(print_alerts(rx, stdout))))
        }
    };
    let dispatcher = builder.build();

    let source = StreamSource::<R::Message>::spawn(input, description, opts.channel_capacity);
    tracing::info!(domain, source = source.description(), "pipeline started");
    let (rx, reader) = source.into_parts();

    dispatcher.run(rx).await;
    let lines = reader.await.context("reader task failed")?;
    let summary = dispatcher.summary();
    let states = dispatcher.store().snapshot().await;

    // Closes the stdout channel.
    drop(dispatcher);
    if let Some(printer) = printer {
        printer.await.context("alert printer failed")??;
    }

    if let Some(file) = &state_file {
        file.save(&states)
            .await
            .with_context(|| format!("failed to save {}", file.path().display()))?;
    }

    if lines.read_error {
        tracing::error!(domain, source = description, "input ended on a read error");
    }

    tracing::info!(
        domain,
        entities = states.len(),
        messages = summary.messages,
        alerts = summary.alerts_delivered,
        failed_batches = summary.failed_batches,
        malformed_lines = lines.malformed,
        "pipeline finished"
    );

    Ok(RunResult {
        summary,
        lines,
        states,
    })
}

async fn print_alerts<A, W>(mut rx: mpsc::Receiver<Delivery<A>>, mut out: W) -> Result<()>
where
    A: Serialize,
    W: AsyncWrite + Unpin,
{
    while let Some(delivery) = rx.recv().await {
        let mut line = serde_json::to_vec(&delivery)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        out.flush().await?;
    }
    Ok(())
}
