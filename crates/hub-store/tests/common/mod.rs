//! Shared helpers for store integration tests

mod mock_router;
mod mock_sender;

pub use mock_router::*;
pub use mock_sender::*;

use hub_core::{device_state, Device, DeviceState};
use hub_logic::SavedState;
use hub_storage::Storage;
use hub_store::Store;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// A started store on a temporary directory
pub struct TestHub {
    pub store: Arc<Store>,
    pub sender: Arc<RecordingSender>,
    pub router: Arc<RecordingRouter>,
    pub ctx: CancellationToken,
    pub dir: TempDir,
}

impl TestHub {
    pub fn new() -> Self {
        Self::in_dir(TempDir::new().unwrap())
    }

    /// Open a store on an existing directory without loading it
    pub fn in_dir(dir: TempDir) -> Self {
        let sender = Arc::new(RecordingSender::new());
        let router = Arc::new(RecordingRouter::default());
        let store = Store::open(Storage::new(dir.path()), sender.clone(), router.clone());
        let ctx = CancellationToken::new();
        store.start(ctx.clone());

        Self {
            store,
            sender,
            router,
            ctx,
            dir,
        }
    }

    /// Let the worker drain its queue and spawned runs make progress
    pub async fn settle(&self) {
        self.store.logic().flush().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.store.logic().flush().await;
    }

    pub async fn shutdown(self) -> TempDir {
        self.ctx.cancel();
        self.store.stop().await;
        self.dir
    }
}

pub fn device(id: &str, state: DeviceState) -> Device {
    Device::new(id.parse().unwrap(), state)
}

/// Scene turning on one lamp on each of two nodes
pub fn two_node_scene() -> SavedState {
    SavedState::new("both lamps")
        .with_device("node-a.lamp".parse().unwrap(), device_state! { "on" => true })
        .with_device("node-b.lamp".parse().unwrap(), device_state! { "on" => true, "brightness" => 80 })
}
