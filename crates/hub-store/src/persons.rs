//! People known to the hub

use chrono::{DateTime, Utc};
use hub_core::DeviceState;
use hub_storage::{Storage, StorageResult, PERSONS_FILE};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument};

use crate::{Area, Store, StoreResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub uuid: String,
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub allow_login: bool,

    #[serde(default)]
    pub is_admin: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,

    /// Presence and similar per-person state
    #[serde(default)]
    pub state: DeviceState,
}

impl Person {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Person registry backed by `persons.json`
pub struct Persons {
    entries: RwLock<BTreeMap<String, Person>>,
    storage: Storage,
}

impl Persons {
    pub fn new(storage: Storage) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            storage,
        }
    }

    pub fn get(&self, uuid: &str) -> Option<Person> {
        self.entries.read().get(uuid).cloned()
    }

    pub fn all(&self) -> BTreeMap<String, Person> {
        self.entries.read().clone()
    }

    pub fn add(&self, person: Person) {
        self.entries.write().insert(person.uuid.clone(), person);
    }

    pub fn remove(&self, uuid: &str) -> Option<Person> {
        self.entries.write().remove(uuid)
    }

    pub async fn save(&self) -> StorageResult<()> {
        self.storage.save(PERSONS_FILE, &self.all()).await
    }

    pub async fn load(&self) -> StorageResult<()> {
        if let Some(entries) = self.storage.load::<BTreeMap<String, Person>>(PERSONS_FILE).await? {
            info!(count = entries.len(), "Loaded persons");
            *self.entries.write() = entries;
        }
        Ok(())
    }
}

impl Store {
    pub fn persons(&self) -> BTreeMap<String, Person> {
        self.persons.all()
    }

    pub fn person(&self, uuid: &str) -> Option<Person> {
        self.persons.get(uuid)
    }

    /// Add or replace a person, persisting when it changed
    #[instrument(skip(self, person), fields(person = %person.uuid))]
    pub async fn add_or_update_person(&self, person: Person) -> StoreResult<()> {
        if self.persons.get(&person.uuid).as_ref() == Some(&person) {
            return Ok(());
        }

        self.persons.add(person);
        let saved = self.persons.save().await;
        self.run_callbacks(Area::Persons);
        Ok(saved?)
    }

    pub async fn remove_person(&self, uuid: &str) -> StoreResult<()> {
        if self.persons.remove(uuid).is_none() {
            return Ok(());
        }
        let saved = self.persons.save().await;
        self.run_callbacks(Area::Persons);
        Ok(saved?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::device_state;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let persons = Persons::new(Storage::new(dir.path()));

        let mut person = Person::new("Alice");
        person.email = "alice@example.com".to_string();
        person.is_admin = true;
        person.state = device_state! { "home" => true };
        let uuid = person.uuid.clone();
        persons.add(person.clone());
        persons.save().await.unwrap();

        let restored = Persons::new(Storage::new(dir.path()));
        restored.load().await.unwrap();
        assert_eq!(restored.get(&uuid), Some(person));
    }
}
