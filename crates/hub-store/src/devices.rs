use hub_core::{Device, DeviceList};
use tracing::{instrument, trace};

use crate::{Area, Store};

impl Store {
    /// The externally visible device list
    pub fn devices(&self) -> &DeviceList {
        &self.devices
    }

    /// Merge a device report and forward it to the rule engine
    ///
    /// Reports that change nothing are dropped here, so neither the rule
    /// engine nor the update callbacks see them.
    #[instrument(skip(self, device), fields(device_id = %device.id))]
    pub fn add_or_update_device(&self, mut device: Device) {
        if let Some(alias) = self
            .node(device.id.node())
            .and_then(|node| node.alias(&device.id).map(str::to_string))
        {
            device.alias = alias;
        }

        if !self.devices.upsert(&device) {
            trace!("Device report unchanged");
            return;
        }

        self.logic.update_device(device);
        self.run_callbacks(Area::Devices);
    }
}
