// Device service - Use case for enumerating the configured belts
use crate::domain::device::{Device, DeviceId};

#[derive(Debug, Clone)]
pub struct DeviceService {
    devices: Vec<Device>,
}

impl DeviceService {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    /// Configured devices in configuration order.
    pub fn list_devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn find(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| &d.id == id)
    }

    /// Display name of `id`, or the id itself for an unknown device.
    pub fn display_name(&self, id: &DeviceId) -> String {
        self.find(id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}
