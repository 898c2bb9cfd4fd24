//! Device ID type representing a node.local_id pair

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid device IDs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceIdError {
    #[error("wrong device id format, expected nodeuuid.deviceid")]
    InvalidFormat,

    #[error("node id cannot be empty")]
    EmptyNode,

    #[error("local device id cannot be empty")]
    EmptyLocalId,
}

/// Globally unique device identity (e.g. "a1b2c3.livingroom-lamp")
///
/// A device is owned by exactly one node. The text form joins the node id
/// and the node-local id with a period; only the first period separates
/// them, so local ids may themselves contain periods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId {
    node: String,
    local_id: String,
}

impl DeviceId {
    /// Create a new DeviceId from its node and local id parts
    pub fn new(node: impl Into<String>, local_id: impl Into<String>) -> Result<Self, DeviceIdError> {
        let node = node.into();
        let local_id = local_id.into();

        if node.is_empty() {
            return Err(DeviceIdError::EmptyNode);
        }
        if local_id.is_empty() {
            return Err(DeviceIdError::EmptyLocalId);
        }
        if node.contains('.') {
            return Err(DeviceIdError::InvalidFormat);
        }

        Ok(Self { node, local_id })
    }

    /// Get the owning node id
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Get the node-local device id
    pub fn local_id(&self) -> &str {
        &self.local_id
    }
}

impl FromStr for DeviceId {
    type Err = DeviceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (node, local_id) = s.split_once('.').ok_or(DeviceIdError::InvalidFormat)?;
        Self::new(node, local_id)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = DeviceIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> String {
        id.to_string()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.local_id)
    }
}
