//! Devices and the concurrent device list

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

use crate::{DeviceId, DeviceState};

/// One controllable/observable endpoint owned by a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alias: String,

    #[serde(default)]
    pub online: bool,

    #[serde(default)]
    pub state: DeviceState,

    #[serde(default)]
    pub traits: Vec<String>,
}

impl Device {
    /// Create an online device with the given state
    pub fn new(id: DeviceId, state: DeviceState) -> Self {
        Self {
            id,
            kind: String::new(),
            name: String::new(),
            alias: String::new(),
            online: true,
            state,
            traits: Vec::new(),
        }
    }

    /// Merge an incoming report for the same device into this one
    ///
    /// Only the state keys present in `incoming` are written; metadata and
    /// the online flag follow the incoming report. Returns whether anything
    /// changed.
    pub fn merge(&mut self, incoming: &Device) -> bool {
        let mut changed = self.state.merge(&incoming.state);

        if self.online != incoming.online {
            self.online = incoming.online;
            changed = true;
        }
        if !incoming.kind.is_empty() && self.kind != incoming.kind {
            self.kind = incoming.kind.clone();
            changed = true;
        }
        if !incoming.name.is_empty() && self.name != incoming.name {
            self.name = incoming.name.clone();
            changed = true;
        }
        if !incoming.alias.is_empty() && self.alias != incoming.alias {
            self.alias = incoming.alias.clone();
            changed = true;
        }
        if !incoming.traits.is_empty() && self.traits != incoming.traits {
            self.traits = incoming.traits.clone();
            changed = true;
        }

        changed
    }
}

/// Concurrent map of every known device keyed by [`DeviceId`]
#[derive(Debug, Default)]
pub struct DeviceList {
    devices: DashMap<DeviceId, Device>,
}

impl DeviceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a device or merge it into the existing one
    ///
    /// The first report of a device is stored as-is. Later reports are
    /// merged field by field (see [`Device::merge`]). Returns whether the
    /// stored device changed.
    pub fn upsert(&self, device: &Device) -> bool {
        match self.devices.get_mut(&device.id) {
            Some(mut existing) => {
                let changed = existing.merge(device);
                trace!(device_id = %device.id, changed, "Merged device report");
                changed
            }
            None => {
                debug!(device_id = %device.id, "Adding new device");
                self.devices.insert(device.id.clone(), device.clone());
                true
            }
        }
    }

    /// Get a copy of a device
    pub fn get(&self, id: &DeviceId) -> Option<Device> {
        self.devices.get(id).map(|d| d.value().clone())
    }

    /// Mark every device owned by `node` offline, keeping its last state
    ///
    /// Returns copies of the devices whose flag actually flipped.
    pub fn set_offline_by_node(&self, node: &str) -> Vec<Device> {
        let mut changed = Vec::new();
        for mut entry in self.devices.iter_mut() {
            if entry.id.node() == node && entry.online {
                entry.online = false;
                changed.push(entry.value().clone());
            }
        }
        debug!(node_id = node, count = changed.len(), "Marked node devices offline");
        changed
    }

    /// Snapshot of every device
    pub fn all(&self) -> HashMap<DeviceId, Device> {
        self.devices
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// State of every device grouped by owning node
    pub fn state_grouped_by_node(&self) -> HashMap<String, BTreeMap<DeviceId, DeviceState>> {
        let mut by_node: HashMap<String, BTreeMap<DeviceId, DeviceState>> = HashMap::new();
        for r in self.devices.iter() {
            by_node
                .entry(r.key().node().to_string())
                .or_default()
                .insert(r.key().clone(), r.state.clone());
        }
        by_node
    }

    /// Flatten every state key into `"node.id.key" -> value`
    pub fn flatten(&self) -> HashMap<String, Value> {
        let mut flat = HashMap::new();
        for r in self.devices.iter() {
            for (key, value) in &r.state {
                flat.insert(format!("{}.{}", r.key(), key), value.clone());
            }
        }
        flat
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl Serialize for DeviceList {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ordered: BTreeMap<DeviceId, Device> = self
            .devices
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        ordered.serialize(serializer)
    }
}
