//! Nodes attached to the hub

use hub_core::DeviceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::{Area, Store};

/// All nodes keyed by uuid
pub type Nodes = BTreeMap<String, Node>;

/// An external device-control process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub uuid: String,

    #[serde(default)]
    pub connected: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Node-specific configuration, opaque to the hub
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,

    /// Operator-chosen device names
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<DeviceId, String>,
}

impl Node {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            ..Default::default()
        }
    }

    pub fn alias(&self, id: &DeviceId) -> Option<&str> {
        self.aliases.get(id).map(String::as_str)
    }

    /// Take the non-empty fields of an incoming node description
    fn merge(&mut self, incoming: Node) {
        self.connected = incoming.connected;
        if !incoming.version.is_empty() {
            self.version = incoming.version;
        }
        if !incoming.kind.is_empty() {
            self.kind = incoming.kind;
        }
        if !incoming.name.is_empty() {
            self.name = incoming.name;
        }
        if incoming.config.is_some() {
            self.config = incoming.config;
        }
        if !incoming.aliases.is_empty() {
            self.aliases = incoming.aliases;
        }
    }
}

impl Store {
    pub fn nodes(&self) -> Nodes {
        self.nodes.read().clone()
    }

    pub fn node(&self, uuid: &str) -> Option<Node> {
        self.nodes.read().get(uuid).cloned()
    }

    /// Register a node or merge the non-empty fields of a known one
    pub fn add_or_update_node(&self, node: Node) {
        {
            let mut nodes = self.nodes.write();
            match nodes.get_mut(&node.uuid) {
                Some(existing) => {
                    if existing == &node {
                        return;
                    }
                    existing.merge(node);
                }
                None => {
                    info!(node_id = %node.uuid, "Node added");
                    nodes.insert(node.uuid.clone(), node);
                }
            }
        }
        self.run_callbacks(Area::Nodes);
    }

    /// Mark a node disconnected and every one of its devices offline
    ///
    /// Devices are kept with their last known state.
    pub fn node_disconnected(&self, uuid: &str) {
        if let Some(node) = self.nodes.write().get_mut(uuid) {
            node.connected = false;
        }

        let offline = self.devices.set_offline_by_node(uuid);
        debug!(node_id = uuid, devices = offline.len(), "Node disconnected");
        for device in offline {
            self.logic.update_device(device);
        }

        self.run_callbacks(Area::Nodes);
        self.run_callbacks(Area::Devices);
    }
}
