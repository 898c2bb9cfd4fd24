//! Home automation hub server
//!
//! Loads the configuration, restores the persisted store and runs the rule
//! engine and scheduler until ctrl-c.

use anyhow::{Context, Result};
use async_trait::async_trait;
use hub_config::HubConfig;
use hub_logic::{MessageType, SendError, Sender};
use hub_storage::Storage;
use hub_store::{Area, Notification, NotificationRouter, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "hub.yaml";

/// Sender used until a node transport is attached: logs every message
struct LogSender;

#[async_trait]
impl Sender for LogSender {
    async fn send_to_id(
        &self,
        node_id: &str,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> Result<(), SendError> {
        info!(node_id, %message_type, %payload, "Outgoing node message");
        Ok(())
    }
}

/// Router used until delivery channels are attached: logs every notification
struct LogRouter;

impl NotificationRouter for LogRouter {
    fn dispatch(&self, notification: Notification) {
        info!(
            kind = ?notification.kind,
            destination = %notification.destination.name,
            sender = %notification.destination.sender,
            body = %notification.body,
            "Notification"
        );
    }
}

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HUB_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

fn init_tracing(config: &HubConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_ascii_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path();
    let config = HubConfig::load(&path)
        .and_then(HubConfig::with_env_overrides)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    init_tracing(&config);

    info!(storage_dir = %config.storage_dir.display(), "Starting hub");

    let storage = Storage::new(&config.storage_dir);
    let store = Store::open(storage, Arc::new(LogSender), Arc::new(LogRouter));
    store.on_update(Arc::new(|area: Area, _: &Store| -> anyhow::Result<()> {
        debug!(%area, "Store updated");
        Ok(())
    }));
    store.load().await.context("loading persisted state")?;

    let ctx = CancellationToken::new();
    store.start(ctx.clone());
    info!("Hub is running");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    ctx.cancel();
    store.stop().await;
    store.save().await.context("saving state")?;
    info!("Hub stopped");

    Ok(())
}
