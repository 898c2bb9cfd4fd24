//! Live transport connections (nodes and browsers)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Area, Store};

/// All connections keyed by connection id
pub type Connections = BTreeMap<String, Connection>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub remote_addr: String,

    /// Node uuid once the peer has identified itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Store {
    pub fn connections(&self) -> Connections {
        self.connections.read().clone()
    }

    pub fn connection(&self, id: &str) -> Option<Connection> {
        self.connections.read().get(id).cloned()
    }

    pub fn add_or_update_connection(&self, id: impl Into<String>, connection: Connection) {
        self.connections.write().insert(id.into(), connection);
        self.run_callbacks(Area::Connections);
    }

    /// Announce a change made to a connection outside the store
    pub fn connection_changed(&self) {
        self.run_callbacks(Area::Connections);
    }

    pub fn remove_connection(&self, id: &str) {
        self.connections.write().remove(id);
        self.run_callbacks(Area::Connections);
    }
}
