use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::StoreError;

/// The collections a change notification can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Devices,
    Connections,
    Nodes,
    Certificates,
    Rules,
    SavedStates,
    Schedules,
    Server,
    Destinations,
    Persons,
}

impl Area {
    pub const ALL: [Area; 10] = [
        Area::Devices,
        Area::Connections,
        Area::Nodes,
        Area::Certificates,
        Area::Rules,
        Area::SavedStates,
        Area::Schedules,
        Area::Server,
        Area::Destinations,
        Area::Persons,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Devices => "devices",
            Area::Connections => "connections",
            Area::Nodes => "nodes",
            Area::Certificates => "certificates",
            Area::Rules => "rules",
            Area::SavedStates => "savedstates",
            Area::Schedules => "schedules",
            Area::Server => "server",
            Area::Destinations => "destinations",
            Area::Persons => "persons",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Area {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Area::ALL
            .into_iter()
            .find(|area| area.as_str() == s)
            .ok_or_else(|| StoreError::UnknownArea(s.to_string()))
    }
}
