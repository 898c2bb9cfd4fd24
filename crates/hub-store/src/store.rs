use hub_core::{DeviceList, DeviceState};
use hub_logic::{Logic, SavedStateStore, Scheduler, Sender};
use hub_storage::Storage;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    Area, Certificate, Connections, Destinations, NotificationRouter, Nodes, Persons, ServerState,
    StoreResult,
};

/// Called with the area that changed; errors are logged and ignored
pub type UpdateCallback = Arc<dyn Fn(Area, &Store) -> anyhow::Result<()> + Send + Sync>;

/// Aggregate of everything the hub knows
///
/// Each collection guards itself; the store only orchestrates the
/// "changed, persist, notify" sequence across them.
pub struct Store {
    pub(crate) logic: Arc<Logic>,
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) saved_states: Arc<SavedStateStore>,
    pub(crate) devices: DeviceList,
    pub(crate) nodes: RwLock<Nodes>,
    pub(crate) connections: RwLock<Connections>,
    pub(crate) certificates: RwLock<Vec<Certificate>>,
    pub(crate) destinations: Destinations,
    pub(crate) persons: Persons,
    pub(crate) server: RwLock<ServerState>,
    pub(crate) router: Arc<dyn NotificationRouter>,
    on_update: RwLock<Vec<UpdateCallback>>,
}

impl Store {
    /// Build a store around existing engine instances
    ///
    /// Rule and task state reports are merged into the `server` area, and
    /// rule destinations are dispatched through `router`.
    pub fn new(
        logic: Arc<Logic>,
        scheduler: Arc<Scheduler>,
        saved_states: Arc<SavedStateStore>,
        storage: Storage,
        router: Arc<dyn NotificationRouter>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Store>| {
            let reporter = weak.clone();
            logic.on_report_state(Arc::new(move |uuid: &str, state: DeviceState| {
                if let Some(store) = reporter.upgrade() {
                    store.add_or_update_server("rules", uuid, state);
                }
            }));

            let reporter = weak.clone();
            scheduler.on_report_state(Arc::new(move |uuid: &str, state: DeviceState| {
                if let Some(store) = reporter.upgrade() {
                    store.add_or_update_server("schedules", uuid, state);
                }
            }));

            let notifier = weak.clone();
            logic.on_trigger_destination(Arc::new(
                move |destination: &str, body: &str| -> anyhow::Result<()> {
                    match notifier.upgrade() {
                        Some(store) => Ok(store.trigger_destination(destination, body)?),
                        None => Ok(()),
                    }
                },
            ));

            Store {
                logic: Arc::clone(&logic),
                scheduler: Arc::clone(&scheduler),
                saved_states: Arc::clone(&saved_states),
                devices: DeviceList::new(),
                nodes: RwLock::new(Nodes::new()),
                connections: RwLock::new(Connections::new()),
                certificates: RwLock::new(Vec::new()),
                destinations: Destinations::new(storage.clone()),
                persons: Persons::new(storage.clone()),
                server: RwLock::new(ServerState::new()),
                router,
                on_update: RwLock::new(Vec::new()),
            }
        })
    }

    /// Build the engines and the store on one storage directory
    pub fn open(
        storage: Storage,
        sender: Arc<dyn Sender>,
        router: Arc<dyn NotificationRouter>,
    ) -> Arc<Self> {
        let saved_states = Arc::new(SavedStateStore::new(storage.clone()));
        let logic = Arc::new(Logic::new(
            Arc::clone(&saved_states),
            Arc::clone(&sender),
            storage.clone(),
        ));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&saved_states),
            sender,
            storage.clone(),
        ));
        Self::new(logic, scheduler, saved_states, storage, router)
    }

    pub fn on_update(&self, callback: UpdateCallback) {
        self.on_update.write().push(callback);
    }

    /// Run every update callback in registration order
    ///
    /// Callbacks run on the caller's task; a slow callback delays the
    /// mutation that triggered it.
    pub(crate) fn run_callbacks(&self, area: Area) {
        let callbacks = self.on_update.read().clone();
        for callback in &callbacks {
            if let Err(e) = callback(area, self) {
                error!(%area, error = %e, "Update callback failed");
            }
        }
    }

    /// JSON view of one area
    pub fn get(&self, area: Area) -> Value {
        let value = match area {
            Area::Devices => serde_json::to_value(&self.devices),
            Area::Connections => serde_json::to_value(&self.connections()),
            Area::Nodes => serde_json::to_value(&self.nodes()),
            Area::Certificates => serde_json::to_value(&self.certificates()),
            Area::Rules => serde_json::to_value(&self.rules()),
            Area::SavedStates => serde_json::to_value(&self.saved_states()),
            Area::Schedules => serde_json::to_value(&self.scheduled_tasks()),
            Area::Server => serde_json::to_value(&self.server_state()),
            Area::Destinations => serde_json::to_value(&self.destinations()),
            Area::Persons => serde_json::to_value(&self.persons()),
        };
        value.unwrap_or_else(|e| {
            warn!(%area, error = %e, "Failed to serialize area");
            Value::Null
        })
    }

    /// Load every persisted collection
    ///
    /// Saved states load first so rules and tasks never start with dangling
    /// references that a later load would fill in.
    pub async fn load(&self) -> StoreResult<()> {
        self.saved_states.load().await?;
        self.logic.load().await?;
        self.scheduler.load().await?;
        self.destinations.load().await?;
        self.persons.load().await?;
        info!("Store loaded");
        Ok(())
    }

    /// Persist every collection
    pub async fn save(&self) -> StoreResult<()> {
        self.saved_states.save().await?;
        self.logic.save().await?;
        self.scheduler.save().await?;
        self.destinations.save().await?;
        self.persons.save().await?;
        Ok(())
    }

    /// Start the rule engine worker and the scheduler
    pub fn start(&self, ctx: CancellationToken) {
        self.logic.start(ctx);
        self.scheduler.start();
    }

    /// Stop the scheduler and wait for the rule engine worker
    ///
    /// The context passed to [`Store::start`] must already be cancelled.
    pub async fn stop(&self) {
        self.scheduler.stop();
        self.logic.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Destination, Notification, StoreError};
    use async_trait::async_trait;
    use hub_core::{device_state, Device};
    use hub_logic::{MessageType, SendError};
    use parking_lot::Mutex;
    use tempfile::TempDir;

    struct NullSender;

    #[async_trait]
    impl Sender for NullSender {
        async fn send_to_id(&self, _: &str, _: MessageType, _: Value) -> Result<(), SendError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Router(Mutex<Vec<Notification>>);

    impl NotificationRouter for Router {
        fn dispatch(&self, notification: Notification) {
            self.0.lock().push(notification);
        }
    }

    fn store(dir: &TempDir) -> (Arc<Store>, Arc<Router>, Arc<Mutex<Vec<Area>>>) {
        let router = Arc::new(Router::default());
        let store = Store::open(Storage::new(dir.path()), Arc::new(NullSender), router.clone());

        let areas = Arc::new(Mutex::new(Vec::new()));
        let sink = areas.clone();
        store.on_update(Arc::new(move |area: Area, _: &Store| -> anyhow::Result<()> {
            sink.lock().push(area);
            Ok(())
        }));
        (store, router, areas)
    }

    fn device(on: bool) -> Device {
        Device::new("n1.lamp".parse().unwrap(), device_state! { "on" => on })
    }

    #[tokio::test]
    async fn test_unchanged_device_does_not_notify() {
        let dir = TempDir::new().unwrap();
        let (store, _, areas) = store(&dir);

        store.add_or_update_device(device(true));
        store.add_or_update_device(device(true));
        store.add_or_update_device(device(false));

        assert_eq!(areas.lock().clone(), vec![Area::Devices, Area::Devices]);
    }

    #[tokio::test]
    async fn test_device_gets_node_alias() {
        let dir = TempDir::new().unwrap();
        let (store, _, _) = store(&dir);

        let mut node = crate::Node::new("n1");
        node.aliases.insert("n1.lamp".parse().unwrap(), "Kitchen".to_string());
        store.add_or_update_node(node);
        store.add_or_update_device(device(true));

        let stored = store.devices().get(&"n1.lamp".parse().unwrap()).unwrap();
        assert_eq!(stored.alias, "Kitchen");
    }

    #[tokio::test]
    async fn test_node_disconnected_marks_devices_offline() {
        let dir = TempDir::new().unwrap();
        let (store, _, areas) = store(&dir);
        store.add_or_update_node(crate::Node {
            uuid: "n1".to_string(),
            connected: true,
            ..Default::default()
        });
        store.add_or_update_device(device(true));
        areas.lock().clear();

        store.node_disconnected("n1");

        let stored = store.devices().get(&"n1.lamp".parse().unwrap()).unwrap();
        assert!(!stored.online);
        assert_eq!(stored.state.bool("on"), Some(true));
        assert!(!store.node("n1").unwrap().connected);
        assert_eq!(areas.lock().clone(), vec![Area::Nodes, Area::Devices]);
    }

    #[tokio::test]
    async fn test_server_state_merges_and_dedupes() {
        let dir = TempDir::new().unwrap();
        let (store, _, areas) = store(&dir);

        store.add_or_update_server("rules", "r1", device_state! { "pending" => true });
        store.add_or_update_server("rules", "r1", device_state! { "active" => true });
        store.add_or_update_server("rules", "r1", device_state! { "active" => true });

        let server = store.server_state();
        assert_eq!(server["rules"]["r1"].bool("pending"), Some(true));
        assert_eq!(server["rules"]["r1"].bool("active"), Some(true));
        assert_eq!(areas.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_trigger_destination() {
        let dir = TempDir::new().unwrap();
        let (store, router, areas) = store(&dir);

        let destination = Destination {
            uuid: "d1".to_string(),
            kind: "email".to_string(),
            name: "admins".to_string(),
            sender: "mail".to_string(),
            destinations: vec!["a@example.com".to_string()],
        };
        store.add_or_update_destination(destination.clone()).await.unwrap();
        store.add_or_update_destination(destination.clone()).await.unwrap();
        assert_eq!(areas.lock().clone(), vec![Area::Destinations]);

        store.trigger_destination("d1", "door open").unwrap();
        store.release_destination("d1", "door closed").unwrap();
        let sent = router.0.lock().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].body, "door open");
        assert_eq!(sent[0].destination, destination);

        assert!(matches!(
            store.trigger_destination("missing", "x"),
            Err(StoreError::DestinationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_callback_error_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let (store, _, areas) = store(&dir);
        store.on_update(Arc::new(|_: Area, _: &Store| anyhow::bail!("broken subscriber")));

        let after = Arc::new(Mutex::new(0));
        let counter = after.clone();
        store.on_update(Arc::new(move |_: Area, _: &Store| -> anyhow::Result<()> {
            *counter.lock() += 1;
            Ok(())
        }));

        store.update_certificates(Vec::new());
        assert_eq!(areas.lock().len(), 1);
        assert_eq!(*after.lock(), 1);
    }

    #[tokio::test]
    async fn test_get_area_views() {
        let dir = TempDir::new().unwrap();
        let (store, _, _) = store(&dir);
        store.add_or_update_device(device(true));
        store.add_or_update_connection(
            "c1",
            crate::Connection {
                kind: "node".to_string(),
                ..Default::default()
            },
        );

        assert_eq!(store.get(Area::Devices)["n1.lamp"]["state"]["on"], true);
        assert_eq!(store.get(Area::Connections)["c1"]["type"], "node");
        assert_eq!(store.get(Area::Rules), serde_json::json!({}));
    }
}
