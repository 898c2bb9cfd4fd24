//! Saved device-state snapshots ("scenes")
//!
//! A saved state maps device ids to the partial state each device should
//! take. Applying one sends a single `state-change` message per node.

use hub_core::{DeviceId, DeviceState};
use hub_storage::{Storage, StorageResult, SAVED_STATE_FILE};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// All saved states keyed by uuid
pub type SavedStates = BTreeMap<String, SavedState>;

/// A named snapshot of target device state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub name: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub state: BTreeMap<DeviceId, DeviceState>,
}

impl SavedState {
    /// Create an empty saved state with a fresh uuid
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid::Uuid::new_v4().to_string(),
            state: BTreeMap::new(),
        }
    }

    /// Add or replace the target state of one device
    pub fn with_device(mut self, id: DeviceId, state: DeviceState) -> Self {
        self.state.insert(id, state);
        self
    }

    /// Split the snapshot per node, keeping full device ids as keys
    ///
    /// This is the payload shape of a `state-change` message: nodes decode
    /// every key as a `"node.id"` device id.
    pub fn group_by_node(&self) -> BTreeMap<String, BTreeMap<DeviceId, DeviceState>> {
        let mut grouped: BTreeMap<String, BTreeMap<DeviceId, DeviceState>> = BTreeMap::new();
        for (id, state) in &self.state {
            grouped
                .entry(id.node().to_string())
                .or_default()
                .insert(id.clone(), state.clone());
        }
        grouped
    }
}

/// Thread-safe registry of saved states backed by `savedstate.json`
pub struct SavedStateStore {
    states: RwLock<SavedStates>,
    storage: Storage,
}

impl SavedStateStore {
    pub fn new(storage: Storage) -> Self {
        Self {
            states: RwLock::new(SavedStates::new()),
            storage,
        }
    }

    /// Get a saved state by uuid
    pub fn get(&self, uuid: &str) -> Option<SavedState> {
        self.states.read().get(uuid).cloned()
    }

    /// Copy of every saved state
    pub fn all(&self) -> SavedStates {
        self.states.read().clone()
    }

    /// Insert or replace one saved state
    pub fn insert(&self, state: SavedState) {
        self.states.write().insert(state.uuid.clone(), state);
    }

    /// Remove one saved state
    pub fn remove(&self, uuid: &str) -> Option<SavedState> {
        self.states.write().remove(uuid)
    }

    /// Replace the whole collection
    pub fn set_state(&self, states: SavedStates) {
        *self.states.write() = backfill_uuids(states);
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }

    /// Persist to `savedstate.json`
    pub async fn save(&self) -> StorageResult<()> {
        let states = self.all();
        self.storage.save(SAVED_STATE_FILE, &states).await?;
        debug!(count = states.len(), "Saved saved states");
        Ok(())
    }

    /// Load from `savedstate.json`, keeping the current set when the file is missing
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(states) = self.storage.load::<SavedStates>(SAVED_STATE_FILE).await? {
            info!(count = states.len(), "Loaded saved states");
            self.set_state(states);
        }
        Ok(())
    }
}

fn backfill_uuids(states: SavedStates) -> SavedStates {
    states
        .into_iter()
        .map(|(key, mut state)| {
            if state.uuid.is_empty() {
                state.uuid = key.clone();
            }
            (key, state)
        })
        .collect()
}
