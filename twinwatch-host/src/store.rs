//! Per-entity state storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};

/// State of a single entity.
///
/// The mutex is held for the whole of a batch, so batches for the same entity
/// run one after another while other entities proceed in parallel.
#[derive(Debug, Default)]
pub struct EntitySlot<S> {
    state: Mutex<S>,
}

impl<S> EntitySlot<S> {
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Wait for exclusive access to the state.
    pub async fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().await
    }
}

impl<S: Clone> EntitySlot<S> {
    /// Copy of the current state, taken between batches.
    pub async fn snapshot(&self) -> S {
        self.state.lock().await.clone()
    }
}

/// Index of every known entity, keyed by id.
#[derive(Debug)]
pub struct EntityStore<S> {
    entities: RwLock<BTreeMap<String, Arc<EntitySlot<S>>>>,
}

impl<S> Default for EntityStore<S> {
    fn default() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<S> EntityStore<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from previously saved states.
    pub fn from_states(states: BTreeMap<String, S>) -> Self {
        let entities = states
            .into_iter()
            .map(|(id, state)| (id, Arc::new(EntitySlot::new(state))))
            .collect();
        Self {
            entities: RwLock::new(entities),
        }
    }

    /// Get an existing slot.
    pub fn get(&self, id: &str) -> Option<Arc<EntitySlot<S>>> {
        self.entities.read().get(id).cloned()
    }

    /// Replace an entity's state, creating the entity if needed.
    ///
    /// A batch already holding the old slot finishes against it.
    pub fn insert(&self, id: impl Into<String>, state: S) {
        self.entities
            .write()
            .insert(id.into(), Arc::new(EntitySlot::new(state)));
    }

    /// Remove an entity. Returns `true` if it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.entities.write().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Entity ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.entities.read().keys().cloned().collect()
    }
}

impl<S: Default> EntityStore<S> {
    /// Get or create the slot for an entity.
    ///
    /// New entities start from the default state.
    pub fn slot(&self, id: &str) -> Arc<EntitySlot<S>> {
        // Fast path
        {
            let entities = self.entities.read();
            if let Some(slot) = entities.get(id) {
                return slot.clone();
            }
        }

        // Slow path
        let mut entities = self.entities.write();
        entities
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(EntitySlot::new(S::default())))
            .clone()
    }
}

impl<S: Clone> EntityStore<S> {
    /// Copy every entity's state.
    ///
    /// Each entity is copied once its in-flight batch, if any, has committed.
    pub async fn snapshot(&self) -> BTreeMap<String, S> {
        let slots: Vec<(String, Arc<EntitySlot<S>>)> = self
            .entities
            .read()
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        let mut states = BTreeMap::new();
        for (id, slot) in slots {
            states.insert(id, slot.snapshot().await);
        }
        states
    }
}
