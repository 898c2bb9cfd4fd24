//! Hub-side state of rules and tasks, surfaced to observers

use hub_core::DeviceState;
use std::collections::BTreeMap;
use tracing::trace;

use crate::{Area, Store};

/// `section -> item uuid -> state`, e.g. `rules -> <uuid> -> {active, pending}`
pub type ServerState = BTreeMap<String, BTreeMap<String, DeviceState>>;

impl Store {
    pub fn server_state(&self) -> ServerState {
        self.server.read().clone()
    }

    /// Merge a partial state into one item of a server section
    pub fn add_or_update_server(&self, section: &str, item: &str, state: DeviceState) {
        let changed = {
            let mut server = self.server.write();
            server
                .entry(section.to_string())
                .or_default()
                .entry(item.to_string())
                .or_default()
                .merge(&state)
        };

        if !changed {
            return;
        }
        trace!(section, item, "Server state changed");
        self.run_callbacks(Area::Server);
    }
}
