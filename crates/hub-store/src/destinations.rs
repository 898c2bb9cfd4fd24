//! Notification destinations

use hub_storage::{Storage, StorageResult, DESTINATIONS_FILE};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use crate::{Area, Notification, NotificationKind, Store, StoreError, StoreResult};

/// Where a notification goes and which sender delivers it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub uuid: String,

    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub name: String,

    /// Id of the configured sender (mail server, push account, ...)
    #[serde(default)]
    pub sender: String,

    /// Sender-specific addresses
    #[serde(default)]
    pub destinations: Vec<String>,
}

/// Destination registry backed by `destinations.json`
pub struct Destinations {
    entries: RwLock<BTreeMap<String, Destination>>,
    storage: Storage,
}

impl Destinations {
    pub fn new(storage: Storage) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            storage,
        }
    }

    pub fn get(&self, uuid: &str) -> Option<Destination> {
        self.entries.read().get(uuid).cloned()
    }

    pub fn all(&self) -> BTreeMap<String, Destination> {
        self.entries.read().clone()
    }

    pub fn add(&self, destination: Destination) {
        self.entries.write().insert(destination.uuid.clone(), destination);
    }

    pub fn remove(&self, uuid: &str) -> Option<Destination> {
        self.entries.write().remove(uuid)
    }

    pub async fn save(&self) -> StorageResult<()> {
        self.storage.save(DESTINATIONS_FILE, &self.all()).await
    }

    pub async fn load(&self) -> StorageResult<()> {
        if let Some(entries) = self
            .storage
            .load::<BTreeMap<String, Destination>>(DESTINATIONS_FILE)
            .await?
        {
            info!(count = entries.len(), "Loaded destinations");
            *self.entries.write() = entries;
        }
        Ok(())
    }
}

impl Store {
    pub fn destinations(&self) -> BTreeMap<String, Destination> {
        self.destinations.all()
    }

    pub fn destination(&self, uuid: &str) -> Option<Destination> {
        self.destinations.get(uuid)
    }

    /// Add or replace a destination, persisting it when it changed
    #[instrument(skip(self, destination), fields(destination = %destination.uuid))]
    pub async fn add_or_update_destination(&self, destination: Destination) -> StoreResult<()> {
        if self.destinations.get(&destination.uuid).as_ref() == Some(&destination) {
            return Ok(());
        }

        self.destinations.add(destination);
        let saved = self.destinations.save().await;
        self.run_callbacks(Area::Destinations);
        Ok(saved?)
    }

    pub async fn remove_destination(&self, uuid: &str) -> StoreResult<()> {
        if self.destinations.remove(uuid).is_none() {
            return Ok(());
        }
        let saved = self.destinations.save().await;
        self.run_callbacks(Area::Destinations);
        Ok(saved?)
    }

    /// Send a trigger notification to a destination
    pub fn trigger_destination(&self, uuid: &str, body: &str) -> StoreResult<()> {
        self.dispatch(NotificationKind::Trigger, uuid, body)
    }

    /// Send a release notification to a destination
    pub fn release_destination(&self, uuid: &str, body: &str) -> StoreResult<()> {
        self.dispatch(NotificationKind::Release, uuid, body)
    }

    fn dispatch(&self, kind: NotificationKind, uuid: &str, body: &str) -> StoreResult<()> {
        let destination = self
            .destinations
            .get(uuid)
            .ok_or_else(|| StoreError::DestinationNotFound(uuid.to_string()))?;

        debug!(destination = %destination.name, ?kind, "Dispatching notification");
        self.router.dispatch(Notification {
            kind,
            destination,
            body: body.to_string(),
        });
        Ok(())
    }
}
