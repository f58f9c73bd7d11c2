//! Routes message batches to per-entity reducers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use twinwatch_core::Reducer;
use twinwatch_types::Millis;

use crate::envelope::{Delivery, Envelope};
use crate::error::HostError;
use crate::output::Output;
use crate::store::EntityStore;

/// Default number of messages drained from the input per round.
pub const DEFAULT_MAX_BATCH: usize = 256;

/// What one successful batch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    pub alerts: usize,
    pub skipped: usize,
}

/// Running totals across all entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispatchSummary {
    pub batches: u64,
    pub messages: u64,
    pub alerts_delivered: u64,
    pub skipped_messages: u64,
    pub failed_batches: u64,
}

#[derive(Debug, Default)]
struct Counters {
    batches: AtomicU64,
    messages: AtomicU64,
    alerts_delivered: AtomicU64,
    skipped_messages: AtomicU64,
    failed_batches: AtomicU64,
}

impl Counters {
    fn summary(&self) -> DispatchSummary {
        DispatchSummary {
            batches: self.batches.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            alerts_delivered: self.alerts_delivered.load(Ordering::Relaxed),
            skipped_messages: self.skipped_messages.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
        }
    }
}

/// Applies batches to entities through a [`Reducer`].
///
/// Batches for one entity are serialized by the entity's slot lock; batches
/// for different entities run concurrently. A batch's new state is committed
/// only after every output accepted every alert it raised, so a failed batch
/// can be replayed and yields the same alerts again.
///
/// # Example
///
/// ```rust
/// use twinwatch_core::{GasLimits, GasSensorReducer};
/// use twinwatch_host::{Dispatcher, Output};
/// use twinwatch_types::{GasSensorMessage, Millis};
///
/// # tokio_test::block_on(async {
/// let (output, mut alerts) = Output::channel(16);
/// let dispatcher = Dispatcher::builder(GasSensorReducer::new(GasLimits::default()))
///     .output(output)
///     .build();
///
/// let batch = [GasSensorMessage::new(250, Millis::from_secs(10))];
/// let outcome = dispatcher.dispatch("sensor-7", &batch).await.unwrap();
/// assert_eq!(outcome.alerts, 1);
/// assert_eq!(alerts.recv().await.unwrap().entity_id, "sensor-7");
/// # });
/// ```
pub struct Dispatcher<R: Reducer> {
    reducer: Arc<R>,
    store: Arc<EntityStore<R::State>>,
    outputs: Arc<Vec<Output<R::Alert>>>,
    counters: Arc<Counters>,
    max_batch: usize,
    clock: fn() -> Millis,
}

impl<R: Reducer> Clone for Dispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            reducer: self.reducer.clone(),
            store: self.store.clone(),
            outputs: self.outputs.clone(),
            counters: self.counters.clone(),
            max_batch: self.max_batch,
            clock: self.clock,
        }
    }
}

impl<R: Reducer> Dispatcher<R>
where
    R::Alert: Serialize,
{
    /// Create a builder for the given reducer.
    pub fn builder(reducer: R) -> DispatcherBuilder<R> {
        DispatcherBuilder::new(reducer)
    }

    /// The reducer in use.
    pub fn reducer(&self) -> &R {
        &self.reducer
    }

    /// The entity store.
    pub fn store(&self) -> &Arc<EntityStore<R::State>> {
        &self.store
    }

    /// Totals so far.
    pub fn summary(&self) -> DispatchSummary {
        self.counters.summary()
    }

    /// Apply one batch to one entity.
    ///
    /// Waits for any batch already running for `id`. On error the entity keeps
    /// its previous state.
    pub async fn dispatch(
        &self,
        id: &str,
        batch: &[R::Message],
    ) -> Result<DispatchOutcome, HostError> {
        let slot = self.store.slot(id);
        let mut state = slot.lock().await;

        let result = self.apply(id, &state, batch).await;
        self.counters.batches.fetch_add(1, Ordering::Relaxed);
        self.counters
            .messages
            .fetch_add(batch.len() as u64, Ordering::Relaxed);

        match result {
            Ok((next, outcome)) => {
                *state = next;
                self.counters
                    .alerts_delivered
                    .fetch_add(outcome.alerts as u64, Ordering::Relaxed);
                self.counters
                    .skipped_messages
                    .fetch_add(outcome.skipped as u64, Ordering::Relaxed);
                Ok(outcome)
            }
            Err(err) => {
                self.counters.failed_batches.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        id: &str,
        state: &R::State,
        batch: &[R::Message],
    ) -> Result<(R::State, DispatchOutcome), HostError> {
        let reduction = self.reducer.reduce(state, batch, (self.clock)())?;

        let deliveries: Vec<_> = reduction
            .alerts
            .iter()
            .map(|alert| Delivery::new(id, alert.clone()))
            .collect();
        for output in self.outputs.iter() {
            if let Err(err) = output.emit(&deliveries).await {
                tracing::warn!(
                    entity = id,
                    output = %output.describe(),
                    alerts = deliveries.len(),
                    error = %err,
                    "alert delivery failed"
                );
                return Err(err);
            }
        }

        let outcome = DispatchOutcome {
            alerts: reduction.alerts.len(),
            skipped: reduction.skipped,
        };
        Ok((reduction.state, outcome))
    }

    /// Consume envelopes until the sender side closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<Envelope<R::Message>>) {
        let mut buf = Vec::with_capacity(self.max_batch);
        while rx.recv_many(&mut buf, self.max_batch).await > 0 {
            self.dispatch_round(std::mem::take(&mut buf)).await;
        }
        tracing::debug!(domain = self.reducer.domain(), "input closed");
    }

    /// Spawn [`run`](Self::run) in the background.
    ///
    /// The loop ends when the input closes or the returned handle is stopped
    /// or dropped. A round that already started is finished first.
    pub fn start(&self, mut rx: mpsc::Receiver<Envelope<R::Message>>) -> DispatchHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let this = self.clone();

        let task = tokio::spawn(async move {
            let mut buf = Vec::with_capacity(this.max_batch);
            loop {
                tokio::select! {
                    received = rx.recv_many(&mut buf, this.max_batch) => {
                        if received == 0 {
                            break;
                        }
                        this.dispatch_round(std::mem::take(&mut buf)).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        DispatchHandle { stop_tx, task }
    }

    /// Group a round of envelopes by entity and run each group concurrently.
    async fn dispatch_round(&self, envelopes: Vec<Envelope<R::Message>>) {
        let groups = group_by_entity(envelopes);
        tracing::trace!(entities = groups.len(), "dispatch round");

        let mut tasks = JoinSet::new();
        for (id, batch) in groups {
            let this = self.clone();
            tasks.spawn(async move {
                if let Err(err) = this.dispatch(&id, &batch).await {
                    tracing::warn!(
                        domain = this.reducer.domain(),
                        entity = %id,
                        messages = batch.len(),
                        error = %err,
                        "batch failed"
                    );
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                tracing::error!(error = %err, "dispatch task panicked");
            }
        }
    }
}

/// Split envelopes into per-entity batches, keeping arrival order within each.
fn group_by_entity<M>(envelopes: Vec<Envelope<M>>) -> Vec<(String, Vec<M>)> {
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    let mut groups: Vec<(String, Vec<M>)> = Vec::new();

    for Envelope { id, message } in envelopes {
        match index.get(&id) {
            Some(&i) => groups[i].1.push(message),
            None => {
                index.insert(id.clone(), groups.len());
                groups.push((id, vec![message]));
            }
        }
    }
    groups
}

/// Builder for configuring a [`Dispatcher`].
pub struct DispatcherBuilder<R: Reducer> {
    reducer: R,
    store: Option<Arc<EntityStore<R::State>>>,
    outputs: Vec<Output<R::Alert>>,
    max_batch: usize,
    clock: fn() -> Millis,
}

impl<R: Reducer> DispatcherBuilder<R> {
    pub fn new(reducer: R) -> Self {
        Self {
            reducer,
            store: None,
            outputs: Vec::new(),
            max_batch: DEFAULT_MAX_BATCH,
            clock: Millis::now,
        }
    }

    /// Add an output destination.
    ///
    /// Multiple outputs can be added; alerts will be delivered to all of them.
    pub fn output(mut self, output: Output<R::Alert>) -> Self {
        self.outputs.push(output);
        self
    }

    /// Start from an existing store, for example one loaded from a state file.
    pub fn store(mut self, store: Arc<EntityStore<R::State>>) -> Self {
        self.store = Some(store);
        self
    }

    /// Most messages drained from the input per round. Values below 1 are raised to 1.
    pub fn max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    /// Clock used for alert and incident timestamps.
    pub fn clock(mut self, clock: fn() -> Millis) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Dispatcher<R> {
        Dispatcher {
            reducer: Arc::new(self.reducer),
            store: self.store.unwrap_or_default(),
            outputs: Arc::new(self.outputs),
            counters: Arc::new(Counters::default()),
            max_batch: self.max_batch,
            clock: self.clock,
        }
    }
}

/// Handle for controlling a background dispatch loop.
///
/// Drop this handle to stop the loop, or call `stop()` explicitly.
pub struct DispatchHandle {
    stop_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl DispatchHandle {
    /// Ask the loop to stop after the current round and wait for it.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }

    /// Wait for the loop to end on its own, once the input closes.
    pub async fn join(self) {
        let DispatchHandle { stop_tx, task } = self;
        let _ = task.await;
        drop(stop_tx);
    }
}
